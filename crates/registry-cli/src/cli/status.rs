use std::{collections::BTreeMap, path::Path};

use clap::Parser;
use registry_core::{Registry, RegistryFilter, RegistryStatus, RequirementStatus};
use serde_json::json;
use tracing::instrument;

use super::{
    list::OutputFormat,
    open,
    terminal::{self, Colorize, is_narrow},
};

#[derive(Debug, Parser, Default)]
#[command(about = "Show registry and requirement counts by review status")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t)]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

/// Totals gathered from every registry in the store.
#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    registries: BTreeMap<RegistryStatus, usize>,
    requirements: BTreeMap<RequirementStatus, usize>,
    comments: usize,
    stale: usize,
}

impl Counts {
    fn gather(registries: &[Registry]) -> Self {
        let mut counts = Self::default();
        for registry in registries {
            *counts.registries.entry(registry.status()).or_insert(0) += 1;
            counts.comments += registry.all_comments().count();
            for requirement in registry.requirements() {
                *counts.requirements.entry(requirement.status()).or_insert(0) += 1;
                if requirement.is_decision_stale() {
                    counts.stale += 1;
                }
            }
        }
        counts
    }

    fn registry_total(&self) -> usize {
        self.registries.values().sum()
    }

    fn requirement_total(&self) -> usize {
        self.requirements.values().sum()
    }
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let workflow = open(root)?;
        let registries = workflow.find_registries(&RegistryFilter::default())?;
        let counts = Counts::gather(&registries);

        if registries.is_empty() {
            println!("No registries found yet. Import one with 'reg import'.");
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => Self::output_json(&counts)?,
            OutputFormat::Table if self.quiet => Self::output_quiet(&counts),
            OutputFormat::Table => Self::output_table(&counts),
        }
        Ok(())
    }

    fn output_json(counts: &Counts) -> anyhow::Result<()> {
        let registries: serde_json::Map<_, _> = counts
            .registries
            .iter()
            .map(|(status, count)| (status.as_str().to_string(), json!(count)))
            .collect();
        let requirements: serde_json::Map<_, _> = counts
            .requirements
            .iter()
            .map(|(status, count)| (status.as_str().to_string(), json!(count)))
            .collect();

        let output = json!({
            "registries": {
                "total": counts.registry_total(),
                "by_status": registries,
            },
            "requirements": {
                "total": counts.requirement_total(),
                "by_status": requirements,
            },
            "comments": counts.comments,
            "stale_decisions": counts.stale,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_quiet(counts: &Counts) {
        println!(
            "registries={} requirements={} comments={} stale={}",
            counts.registry_total(),
            counts.requirement_total(),
            counts.comments,
            counts.stale
        );
    }

    fn output_table(counts: &Counts) {
        let narrow = is_narrow();

        println!("Registries");
        println!("{}", "──────────".dim());
        for (status, count) in &counts.registries {
            if narrow {
                println!("{}: {count}", terminal::registry_status(*status, 0));
            } else {
                println!("{} {count}", terminal::registry_status(*status, 20));
            }
        }
        println!("Total: {}", counts.registry_total());
        println!();

        println!("Requirements");
        println!("{}", "────────────".dim());
        for (status, count) in &counts.requirements {
            if narrow {
                println!("{}: {count}", terminal::requirement_status(*status, 0));
            } else {
                println!("{} {count}", terminal::requirement_status(*status, 20));
            }
        }
        println!("Total: {}", counts.requirement_total());
        println!();

        println!("Comments: {}", counts.comments);
        if counts.stale == 0 {
            println!("Stale decisions: {} ✅", "0".success());
        } else {
            println!(
                "Stale decisions: {} ⚠️",
                counts.stale.to_string().warning()
            );
            println!("{}", "Run 'reg stale' to list them.".dim());
        }
    }
}

/// Lists requirements whose attributes changed after they were decided.
#[derive(Debug, Parser)]
pub struct Stale {
    /// Exit with an error if any decision is stale
    #[arg(long)]
    check: bool,
}

impl Stale {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let workflow = open(root)?;
        let stale = workflow.stale_decisions()?;
        let digits = workflow.config().digits();

        if stale.is_empty() {
            println!("{}", "No stale decisions".success());
            return Ok(());
        }

        for entry in &stale {
            println!(
                "{}  {}",
                entry.requirement.display(digits),
                entry.registry_name.dim()
            );
        }

        if self.check {
            anyhow::bail!("{} stale decisions", stale.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use registry_core::{Attributes, Outcome};
    use tempfile::tempdir;

    use super::*;

    fn rows(n: usize) -> Vec<Attributes> {
        (0..n)
            .map(|i| Attributes::from([("Country".to_string(), format!("C{i}"))]))
            .collect()
    }

    #[test]
    fn counts_group_by_status() {
        let tmp = tempdir().unwrap();
        let mut workflow = open(tmp.path()).unwrap();
        let a = workflow.import_registry("A", "alice", rows(2)).unwrap().id();
        workflow.import_registry("B", "bob", rows(1)).unwrap();
        workflow.submit_registry(a).unwrap();
        workflow
            .submit_requirement(a, &"REQ-001".parse().unwrap())
            .unwrap();

        let registries = workflow
            .find_registries(&RegistryFilter::default())
            .unwrap();
        let counts = Counts::gather(&registries);

        assert_eq!(counts.registry_total(), 2);
        assert_eq!(counts.registries[&RegistryStatus::InQaQc], 1);
        assert_eq!(counts.registries[&RegistryStatus::NotPublished], 1);
        assert_eq!(counts.requirement_total(), 3);
        assert_eq!(counts.requirements[&RequirementStatus::Submitted], 1);
        assert_eq!(counts.requirements[&RequirementStatus::Draft], 2);
        assert_eq!(counts.stale, 0);
    }

    #[test]
    fn status_runs_on_empty_store() {
        let tmp = tempdir().unwrap();
        Status::default().run(tmp.path()).unwrap();
    }

    #[test]
    fn stale_check_fails_once_a_decided_row_changes() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        let requirement = "REQ-001".parse().unwrap();
        {
            let mut workflow = open(root).unwrap();
            let id = workflow.import_registry("A", "alice", rows(1)).unwrap().id();
            workflow.submit_registry(id).unwrap();
            workflow.submit_requirement(id, &requirement).unwrap();
            workflow.assign_qa_reviewer(id, &requirement, "qa").unwrap();
            workflow.decide(id, &requirement, Outcome::Approve).unwrap();
        }

        Stale { check: true }.run(root).unwrap();

        let mut workflow = open(root).unwrap();
        let id = workflow
            .find_registries(&RegistryFilter::default())
            .unwrap()[0]
            .id();
        workflow
            .update_requirement_attributes(
                id,
                &requirement,
                Attributes::from([("Country".to_string(), "DE".to_string())]),
            )
            .unwrap();

        assert!(Stale { check: true }.run(root).is_err());
        Stale { check: false }.run(root).unwrap();
        Status {
            output: OutputFormat::Json,
            quiet: false,
        }
        .run(root)
        .unwrap();
    }
}
