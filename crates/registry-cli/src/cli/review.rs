//! Status transition commands.

use std::path::Path;

use clap::Parser;
use registry_core::{Outcome, Registry, Requirement, RequirementId};
use tracing::instrument;

use super::{
    open, parse_requirement_id, resolve_registry,
    terminal::{self, Colorize},
};

fn print_registry(registry: &Registry) {
    println!(
        "{}: {}",
        registry.name(),
        terminal::registry_status(registry.status(), 0)
    );
}

fn print_requirement(requirement: &Requirement, digits: usize) {
    let reviewer = requirement
        .qa_user()
        .map(|user| format!(" (QA: {user})").dim())
        .unwrap_or_default();
    println!(
        "{}: {}{reviewer}",
        requirement.id().display(digits),
        terminal::requirement_status(requirement.status(), 0)
    );
}

#[derive(Debug, Parser)]
pub struct Submit {
    /// Registry id or name
    registry: String,
}

impl Submit {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        print_registry(&workflow.submit_registry(id)?);
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct SubmitRequirement {
    /// Registry id or name
    registry: String,

    /// Requirement to submit
    #[arg(value_parser = parse_requirement_id)]
    requirement: RequirementId,
}

impl SubmitRequirement {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let requirement = workflow.submit_requirement(id, &self.requirement)?;
        print_requirement(&requirement, workflow.config().digits());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Assign {
    /// Registry id or name
    registry: String,

    /// Requirement to review
    #[arg(value_parser = parse_requirement_id)]
    requirement: RequirementId,

    /// The QA reviewer
    user: String,
}

impl Assign {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let requirement = workflow.assign_qa_reviewer(id, &self.requirement, &self.user)?;
        print_requirement(&requirement, workflow.config().digits());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Decide {
    /// Registry id or name
    registry: String,

    /// Requirement to decide
    #[arg(value_parser = parse_requirement_id)]
    requirement: RequirementId,

    /// approve or reject
    outcome: Outcome,
}

impl Decide {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let requirement = workflow.decide(id, &self.requirement, self.outcome)?;
        print_requirement(&requirement, workflow.config().digits());
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Reopen {
    /// Registry id or name
    registry: String,

    /// Requirement to send back to draft
    #[arg(value_parser = parse_requirement_id)]
    requirement: RequirementId,
}

impl Reopen {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        let requirement = workflow.reopen(id, &self.requirement)?;
        print_requirement(&requirement, workflow.config().digits());
        print_registry(&workflow.get_registry(id)?);
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct RequestApproval {
    /// Registry id or name
    registry: String,
}

impl RequestApproval {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        print_registry(&workflow.request_approval(id)?);
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct DecideRegistry {
    /// Registry id or name
    registry: String,

    /// approve or reject
    outcome: Outcome,
}

impl DecideRegistry {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        print_registry(&workflow.decide_registry(id, self.outcome)?);
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct ReopenRegistry {
    /// Registry id or name
    registry: String,
}

impl ReopenRegistry {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut workflow = open(root)?;
        let id = resolve_registry(&workflow, &self.registry)?;
        print_registry(&workflow.reopen_registry(id)?);
        Ok(())
    }
}
