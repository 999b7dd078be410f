use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use registry_core::{Attributes, RequirementId};
use serde_json::Value;
use tracing::instrument;

use super::{open, parse_requirement_id, resolve_registry, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Import {
    /// JSON file holding an array of rows, each an object of attribute values
    file: PathBuf,

    /// The user that owns the new registry
    #[arg(long, short)]
    owner: String,

    /// Registry name (defaults to the file name without extension)
    #[arg(long, short)]
    name: Option<String>,
}

impl Import {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;

        let name = match self.name {
            Some(name) => name,
            None => self
                .file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow::anyhow!("Cannot derive a name from {}", self.file.display()))?,
        };

        let rows = read_rows(&self.file)?;
        let registry = workflow.import_registry(&name, &self.owner, rows)?;

        println!(
            "{}",
            format!(
                "✅ Imported '{}' with {} requirements",
                registry.name(),
                registry.requirements().len()
            )
            .success()
        );
        println!("{}", registry.id().to_string().dim());
        Ok(())
    }
}

/// Reads rows from a JSON array of objects.
///
/// Strings are kept as they are, numbers and booleans are written out, and
/// nulls count as an absent attribute.
fn read_rows(path: &Path) -> anyhow::Result<Vec<Attributes>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let raw: Vec<serde_json::Map<String, Value>> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not a JSON array of objects", path.display()))?;

    raw.into_iter()
        .enumerate()
        .map(|(index, object)| {
            object
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::Null => None,
                    Value::String(s) => Some(Ok((key, s))),
                    Value::Number(n) => Some(Ok((key, n.to_string()))),
                    Value::Bool(b) => Some(Ok((key, b.to_string()))),
                    Value::Array(_) | Value::Object(_) => Some(Err(anyhow::anyhow!(
                        "row {}: attribute '{key}' must be a plain value",
                        index + 1
                    ))),
                })
                .collect::<anyhow::Result<Attributes>>()
        })
        .collect()
}

#[derive(Debug, Parser)]
pub struct CloneRegistry {
    /// Registry id or name
    registry: String,
}

impl CloneRegistry {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let copy = workflow.clone_registry(id)?;
        println!("{}", format!("Created '{}'", copy.name()).success());
        println!("{}", copy.id().to_string().dim());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct CloneRequirement {
    /// Registry id or name
    registry: String,

    /// Requirement to copy
    #[arg(value_parser = parse_requirement_id)]
    requirement: RequirementId,
}

impl CloneRequirement {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let copy = workflow.clone_requirement(id, &self.requirement)?;
        let digits = workflow.config().digits();
        println!(
            "{}",
            format!(
                "Copied {} to {}",
                self.requirement.display(digits),
                copy.id().display(digits)
            )
            .success()
        );
        Ok(())
    }
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing attribute name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[derive(Debug, Parser)]
pub struct Update {
    /// Registry id or name
    registry: String,

    /// Requirement to edit
    #[arg(value_parser = parse_requirement_id)]
    requirement: RequirementId,

    /// New values as KEY=VALUE
    #[arg(required = true, value_parser = parse_assignment)]
    changes: Vec<(String, String)>,
}

impl Update {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let before = workflow.get_requirement(id, &self.requirement)?;
        let changes: Attributes = self.changes.into_iter().collect();

        let after = workflow.update_requirement_attributes(id, &self.requirement, changes)?;

        let digits = workflow.config().digits();
        if before.attributes() == after.attributes() {
            println!("{} is unchanged", self.requirement.display(digits));
            return Ok(());
        }
        println!("{}", format!("Updated {}", self.requirement.display(digits)).success());
        for (key, value) in after.attributes() {
            match before.attribute(key) {
                Some(old) if old == value => {}
                Some(old) => println!("  {key}: {} → {value}", old.dim()),
                None => println!("  {key}: {value}"),
            }
        }
        if after.is_decision_stale() {
            println!(
                "{}",
                "The last decision predates this change; consider reopening.".warning()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Rename {
    /// Registry id or name
    registry: String,

    /// The new name
    name: String,
}

impl Rename {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let registry = workflow.rename_registry(id, &self.name)?;
        println!("{}", format!("Renamed to '{}'", registry.name()).success());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Delete {
    /// Registry id or name
    registry: String,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let registry = workflow.get_registry(id)?;

        if !self.yes {
            let summary = registry.summary();
            let confirmed = dialoguer::Confirm::new()
                .with_prompt(format!(
                    "Delete '{}' with {} requirements and {} comments?",
                    summary.name, summary.requirement_count, summary.comment_count
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Cancelled");
                return Ok(());
            }
        }

        workflow.delete_registry(id)?;
        println!("{}", format!("Deleted '{}'", registry.name()).success());
        Ok(())
    }
}
