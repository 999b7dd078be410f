use std::path::{Path, PathBuf};

mod comment;
mod config;
mod list;
mod manage;
mod review;
mod status;
mod terminal;

use clap::ArgAction;
use comment::CommentCommand;
use config::{ConfigCommand, Init};
use list::{List, Rows, Show};
use manage::{CloneRegistry, CloneRequirement, Delete, Import, Rename, Update};
use registry_core::{DirectoryStore, RegistryId, RegistryStore, RequirementId, Workflow};
use review::{
    Assign, Decide, DecideRegistry, Reopen, ReopenRegistry, RequestApproval, Submit,
    SubmitRequirement,
};
use status::{Stale, Status};

/// Parse a requirement id from a string, normalizing to uppercase.
fn parse_requirement_id(s: &str) -> Result<RequirementId, String> {
    s.to_uppercase().parse().map_err(|e| format!("{e}"))
}

/// Opens the store at `root` together with its configuration.
fn open(root: &Path) -> anyhow::Result<Workflow<DirectoryStore>> {
    let store = DirectoryStore::open(root)?;
    let config = store.load_config().map_err(anyhow::Error::msg)?;
    Ok(Workflow::new(store, config))
}

/// Resolves a registry given either its id or its exact name.
fn resolve_registry(workflow: &Workflow<DirectoryStore>, key: &str) -> anyhow::Result<RegistryId> {
    if let Ok(id) = key.parse::<RegistryId>() {
        return Ok(id);
    }

    let matches: Vec<_> = workflow
        .store()
        .list()?
        .into_iter()
        .filter(|registry| registry.name() == key)
        .map(|registry| registry.id())
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => anyhow::bail!("No registry named '{key}'"),
        _ => anyhow::bail!(
            "{} registries are named '{key}', use the registry id instead",
            matches.len()
        ),
    }
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the registry store
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(&self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show registry and requirement counts by status (default)
    Status(Status),

    /// Initialize a new registry store
    Init(Init),

    /// Show configuration settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Import a registry from a JSON file of rows
    Import(Import),

    /// List registries, optionally filtered
    List(List),

    /// Show every requirement of the matching registries as one table
    Rows(Rows),

    /// Show a registry with its requirements and history
    Show(Show),

    /// Submit a registry for QA
    Submit(Submit),

    /// Submit a single requirement
    SubmitReq(SubmitRequirement),

    /// Assign a QA reviewer to a requirement
    ///
    /// A submitted requirement enters QA when a reviewer is assigned.
    Assign(Assign),

    /// Approve or reject a requirement in QA
    Decide(Decide),

    /// Send a requirement back to draft
    Reopen(Reopen),

    /// Ask for the registry-level decision
    RequestApproval(RequestApproval),

    /// Approve or reject a registry waiting for approval
    DecideRegistry(DecideRegistry),

    /// Send a registry back to draft
    ReopenRegistry(ReopenRegistry),

    /// Copy a registry into a new draft
    Clone(CloneRegistry),

    /// Copy a requirement within its registry
    CloneReq(CloneRequirement),

    /// Change requirement attribute values
    Update(Update),

    /// Rename a registry
    Rename(Rename),

    /// Delete a registry with its requirements and comments
    Delete(Delete),

    /// Add or list comments
    #[command(subcommand)]
    Comment(CommentCommand),

    /// List decisions taken before the latest attribute change
    Stale(Stale),
}

impl Command {
    fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root)?,
            Self::Init(command) => command.run(root)?,
            Self::Config(command) => command.run(root)?,
            Self::Import(command) => command.run(root)?,
            Self::List(command) => command.run(root)?,
            Self::Rows(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::Submit(command) => command.run(root)?,
            Self::SubmitReq(command) => command.run(root)?,
            Self::Assign(command) => command.run(root)?,
            Self::Decide(command) => command.run(root)?,
            Self::Reopen(command) => command.run(root)?,
            Self::RequestApproval(command) => command.run(root)?,
            Self::DecideRegistry(command) => command.run(root)?,
            Self::ReopenRegistry(command) => command.run(root)?,
            Self::Clone(command) => command.run(root)?,
            Self::CloneReq(command) => command.run(root)?,
            Self::Update(command) => command.run(root)?,
            Self::Rename(command) => command.run(root)?,
            Self::Delete(command) => command.run(root)?,
            Self::Comment(command) => command.run(root)?,
            Self::Stale(command) => command.run(root)?,
        }
        Ok(())
    }
}
