//! Domain models for registry review.
//!
//! This module contains the core domain types: registries, requirements,
//! comments, the review state machines, and configuration.

mod comment;
pub use comment::{Comment, CommentLevel, CommentTarget, ValidationError};

mod config;
pub use config::{AttributeMetadata, Config};

/// Listing filters and the flattened tabular view.
pub mod filter;
pub use filter::{FlatRow, RegistryFilter};

/// Audit trail types.
pub mod history;
pub use history::{Event, HistoryEntry};

/// Requirement and registry identifiers.
pub mod id;
pub use id::{ParseIdError, Prefix, RegistryId, RequirementId};

mod registry;
pub use registry::{Registry, RegistrySummary};

mod requirement;
pub use requirement::{Attributes, Decision, Requirement};

/// Review state machines.
pub mod status;
pub use status::{InvalidTransitionError, Outcome, RegistryStatus, RequirementStatus};
