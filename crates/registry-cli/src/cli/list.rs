use std::{collections::BTreeSet, path::Path};

use anyhow::Context;
use clap::{Args, Parser, ValueEnum};
use registry_core::{
    DirectoryStore, FlatRow, RegistryFilter, RegistrySummary, Workflow, domain::Event,
};
use serde::Serialize;
use tracing::instrument;

use super::{
    open, resolve_registry,
    terminal::{self, Colorize, is_narrow},
};

/// Supported output formats.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Aligned columns for humans
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Registry filters shared by `list` and `rows`.
#[derive(Debug, Args, Default)]
pub struct FilterArgs {
    /// Exact match on the Country attribute ("All" matches everything)
    #[arg(long)]
    country: Option<String>,

    /// Exact match on the Template attribute
    #[arg(long)]
    template: Option<String>,

    /// Exact match on the registry owner
    #[arg(long)]
    owner: Option<String>,

    /// Exact match on the Client attribute
    #[arg(long)]
    client: Option<String>,

    /// Exact match on the Jurisdiction attribute
    #[arg(long)]
    jurisdiction: Option<String>,

    /// Case-insensitive search in names and attribute values
    #[arg(long, short)]
    query: Option<String>,
}

impl From<FilterArgs> for RegistryFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            country: args.country,
            template: args.template,
            owner: args.owner,
            client: args.client,
            jurisdiction: args.jurisdiction,
            text_query: args.query,
        }
    }
}

#[derive(Debug, Parser)]
pub struct List {
    #[command(flatten)]
    filter: FilterArgs,

    /// Output format (default: table).
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct SummaryOut {
    id: String,
    name: String,
    owner: String,
    status: &'static str,
    submitted: bool,
    requirements: usize,
    comments: usize,
}

impl From<&RegistrySummary> for SummaryOut {
    fn from(summary: &RegistrySummary) -> Self {
        Self {
            id: summary.id.to_string(),
            name: summary.name.clone(),
            owner: summary.owner.clone(),
            status: summary.status.as_str(),
            submitted: summary.submitted,
            requirements: summary.requirement_count,
            comments: summary.comment_count,
        }
    }
}

impl List {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let workflow = open(root)?;
        let summaries = workflow.list_registries(&self.filter.into())?;

        match self.output {
            OutputFormat::Json => {
                let out: Vec<_> = summaries.iter().map(SummaryOut::from).collect();
                serde_json::to_writer_pretty(std::io::stdout(), &out)
                    .context("failed to render json output")?;
                println!();
            }
            OutputFormat::Table if summaries.is_empty() => {
                println!("No registries found. Import one with 'reg import'.");
            }
            OutputFormat::Table => render_summaries(&summaries),
        }
        Ok(())
    }
}

fn render_summaries(summaries: &[RegistrySummary]) {
    if is_narrow() {
        for summary in summaries {
            println!(
                "{} {}",
                summary.name,
                terminal::registry_status(summary.status, 0)
            );
            println!("  {}", summary.id.to_string().dim());
        }
        return;
    }

    let name_width = summaries
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    let owner_width = summaries
        .iter()
        .map(|s| s.owner.len())
        .max()
        .unwrap_or(0)
        .max("Owner".len());
    let status_width = "WaitingForApproval".len();

    let (id, name, owner, status) = ("Id", "Name", "Owner", "Status");
    println!(
        "{id:<36}  {name:<name_width$}  {owner:<owner_width$}  {status:<status_width$}  Reqs  Comments"
    );
    println!(
        "{}",
        "-".repeat(36 + name_width + owner_width + status_width + 24).dim()
    );
    for summary in summaries {
        println!(
            "{:<36}  {:<name_width$}  {:<owner_width$}  {}  {:<4}  {}",
            summary.id,
            summary.name,
            summary.owner,
            terminal::registry_status(summary.status, status_width),
            summary.requirement_count,
            summary.comment_count
        );
    }
}

#[derive(Debug, Parser)]
pub struct Rows {
    #[command(flatten)]
    filter: FilterArgs,

    /// Attribute columns to show (default: every attribute present)
    #[arg(long, value_delimiter = ',', value_name = "ATTR")]
    columns: Vec<String>,

    /// Output format (default: table).
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl Rows {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let workflow = open(root)?;
        let registries = workflow.find_registries(&self.filter.into())?;
        let rows = Workflow::<DirectoryStore>::flatten_requirements(&registries);
        let digits = workflow.config().digits();

        let columns = if self.columns.is_empty() {
            attribute_columns(&rows)
        } else {
            self.columns
        };

        match self.output {
            OutputFormat::Json => render_rows_json(&rows, &columns, digits),
            OutputFormat::Table => {
                render_rows_table(&rows, &columns, digits);
                Ok(())
            }
        }
    }
}

/// Every attribute name that appears in any row, sorted.
fn attribute_columns(rows: &[FlatRow]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.attributes.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn render_rows_json(rows: &[FlatRow], columns: &[String], digits: usize) -> anyhow::Result<()> {
    let out: Vec<_> = rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            object.insert("registry".into(), row.registry_name.clone().into());
            object.insert(
                "id".into(),
                row.requirement_id.display(digits).to_string().into(),
            );
            object.insert("owner".into(), row.owner.clone().into());
            object.insert("status".into(), row.status.as_str().into());
            object.insert("comments".into(), row.comment_count.into());
            for column in columns {
                if let Some(value) = row.attributes.get(column) {
                    object.insert(column.clone(), value.clone().into());
                }
            }
            serde_json::Value::Object(object)
        })
        .collect();

    serde_json::to_writer_pretty(std::io::stdout(), &out)
        .context("failed to render json output")?;
    println!();
    Ok(())
}

fn render_rows_table(rows: &[FlatRow], columns: &[String], digits: usize) {
    let mut headers: Vec<String> = ["Registry", "Id", "Owner", "Status", "Comments"]
        .into_iter()
        .map(String::from)
        .collect();
    headers.extend(columns.iter().cloned());

    let data: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.registry_name.clone(),
                row.requirement_id.display(digits).to_string(),
                row.owner.clone(),
                row.status.to_string(),
                row.comment_count.to_string(),
            ];
            cells.extend(
                columns
                    .iter()
                    .map(|c| row.attributes.get(c).cloned().unwrap_or_default()),
            );
            cells
        })
        .collect();

    // Determine column widths for alignment.
    let widths = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            data.iter()
                .map(|row| row[idx].chars().count())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect::<Vec<_>>();

    for (header, width) in headers.iter().zip(&widths) {
        print!("{header:<width$}  ");
    }
    println!();
    for width in &widths {
        print!("{:-<width$}  ", "");
    }
    println!();

    for (row, cells) in rows.iter().zip(data) {
        for (idx, value) in cells.iter().enumerate() {
            let width = widths[idx];
            if idx == 3 {
                print!("{}  ", terminal::requirement_status(row.status, width));
            } else {
                print!("{value:<width$}  ");
            }
        }
        println!();
    }
}

#[derive(Debug, Parser)]
pub struct Show {
    /// Registry id or name
    registry: String,

    /// Include the audit trail
    #[arg(long)]
    history: bool,
}

impl Show {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let registry = workflow.get_registry(id)?;
        let digits = workflow.config().digits();

        println!("{}", registry.name().info());
        println!("  Id:        {}", registry.id());
        println!("  Owner:     {}", registry.owner());
        println!(
            "  Status:    {}",
            terminal::registry_status(registry.status(), 0)
        );
        println!("  Created:   {}", registry.created().format("%Y-%m-%d %H:%M"));
        if let Some(comment) = registry.document_comment() {
            println!("  Comment:   {comment}");
        }
        println!();

        for requirement in registry.requirements() {
            let reviewer = requirement
                .qa_user()
                .map(|user| format!("  QA: {user}"))
                .unwrap_or_default();
            let stale = if requirement.is_decision_stale() {
                "  (decision stale)".warning()
            } else {
                String::new()
            };
            println!(
                "{}  {}{reviewer}{stale}",
                requirement.id().display(digits),
                terminal::requirement_status(requirement.status(), 9)
            );
            for (key, value) in requirement.attributes() {
                println!("    {}: {value}", key.dim());
            }
        }

        if self.history {
            println!();
            println!("History");
            println!("{}", "───────".dim());
            for entry in registry.history() {
                let subject = entry
                    .requirement
                    .as_ref()
                    .map(|id| format!("{} ", id.display(digits)))
                    .unwrap_or_default();
                println!(
                    "{}  {subject}{}",
                    entry.at.format("%Y-%m-%d %H:%M:%S").to_string().dim(),
                    describe(&entry.event)
                );
            }
        }
        Ok(())
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::Imported { rows } => format!("imported {rows} rows"),
        Event::ClonedFrom { source } => format!("cloned from {source}"),
        Event::RequirementCloned { source } => format!("cloned from {source}"),
        Event::Renamed { from } => format!("renamed from '{from}'"),
        Event::Submitted => "submitted".to_string(),
        Event::ReviewerAssigned { user } => format!("assigned to {user}"),
        Event::Decided { outcome } | Event::RegistryDecided { outcome } => {
            format!("decision: {outcome}")
        }
        Event::ApprovalRequested => "approval requested".to_string(),
        Event::Reopened { from } => format!("reopened from {from}"),
        Event::RegistryReopened { from } => format!("reopened from {from}"),
        Event::AttributesUpdated { keys } => format!("updated {}", keys.join(", ")),
    }
}
