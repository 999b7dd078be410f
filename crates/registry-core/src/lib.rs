//! Review and approval workflows for registries of requirements.
//!
//! A registry is imported from already-parsed spreadsheet rows, moved through
//! an explicit review state machine, and annotated with append-only comments
//! at document, row, and cell granularity. All changes go through
//! [`Workflow`], which persists registries via a [`RegistryStore`].

/// Domain types and business rules.
pub mod domain;
pub use domain::{
    Attributes, Comment, CommentLevel, CommentTarget, Config, FlatRow, Outcome, Registry,
    RegistryFilter, RegistryId, RegistryStatus, RegistrySummary, Requirement, RequirementId,
    RequirementStatus,
};

pub mod error;
pub use error::Error;

pub mod storage;
pub use storage::{DirectoryStore, InMemoryStore, RegistryStore};

mod workflow;
pub use workflow::{CommentQuery, StaleDecision, Workflow};
