//! Audit trail of state-changing commands applied to a registry.

use chrono::{DateTime, Utc};

use crate::domain::{
    RegistryId, RequirementId,
    status::{Outcome, RegistryStatus, RequirementStatus},
};

/// One entry in a registry's append-only history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When the command was applied.
    pub at: DateTime<Utc>,
    /// The requirement affected, or `None` for registry-level events.
    pub requirement: Option<RequirementId>,
    /// What happened.
    pub event: Event,
}

/// A recorded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Registry created by import.
    Imported {
        /// Number of requirements created.
        rows: usize,
    },
    /// Registry created as a copy of another.
    ClonedFrom {
        /// The source registry.
        source: RegistryId,
    },
    /// Requirement created as a copy of another requirement.
    RequirementCloned {
        /// The source requirement.
        source: RequirementId,
    },
    /// Registry renamed.
    Renamed {
        /// Previous name.
        from: String,
    },
    /// Registry or requirement submitted.
    Submitted,
    /// QA reviewer assigned.
    ReviewerAssigned {
        /// The reviewer.
        user: String,
    },
    /// Requirement-level decision.
    Decided {
        /// Approve or reject.
        outcome: Outcome,
    },
    /// Registry moved to `WaitingForApproval`.
    ApprovalRequested,
    /// Registry-level decision.
    RegistryDecided {
        /// Approve or reject.
        outcome: Outcome,
    },
    /// Requirement sent back to draft.
    Reopened {
        /// Status before reopening.
        from: RequirementStatus,
    },
    /// Registry sent back to `NotPublished`.
    RegistryReopened {
        /// Status before reopening.
        from: RegistryStatus,
    },
    /// Attribute values changed.
    AttributesUpdated {
        /// Keys whose values changed.
        keys: Vec<String>,
    },
}
