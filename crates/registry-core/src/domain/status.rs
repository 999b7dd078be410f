//! Review state machines for registries and requirements.
//!
//! Statuses are never set directly by callers. Every change goes through one
//! of the transition functions here, which return an
//! [`InvalidTransitionError`] for edges the workflow does not allow.

use std::{fmt, str::FromStr};

/// Review status of a single requirement.
///
/// Statuses advance along `Draft → Submitted → InQaQc → {Approved, Rejected}`.
/// The only way back is [`RequirementStatus::reopen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RequirementStatus {
    /// Being edited by its owner.
    #[default]
    Draft,
    /// Handed in for review, no reviewer yet.
    Submitted,
    /// Under quality assurance / quality control review.
    InQaQc,
    /// Accepted by QA.
    Approved,
    /// Refused by QA.
    Rejected,
}

impl RequirementStatus {
    /// Position of the status in the forward order. Both terminal statuses
    /// share the highest rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::InQaQc => 2,
            Self::Approved | Self::Rejected => 3,
        }
    }

    /// Whether the status is `Approved` or `Rejected`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// `Draft → Submitted`.
    ///
    /// # Errors
    ///
    /// Fails from any status other than `Draft`.
    pub const fn submit(self) -> Result<Self, InvalidTransitionError> {
        match self {
            Self::Draft => Ok(Self::Submitted),
            from => Err(InvalidTransitionError::requirement(from, Action::Submit)),
        }
    }

    /// Status after a QA reviewer has been assigned.
    ///
    /// Assigning a reviewer to a submitted requirement starts QA. Drafts and
    /// requirements already in QA keep their status.
    ///
    /// # Errors
    ///
    /// Fails for terminal statuses.
    pub const fn assign_reviewer(self) -> Result<Self, InvalidTransitionError> {
        match self {
            Self::Submitted => Ok(Self::InQaQc),
            Self::Draft | Self::InQaQc => Ok(self),
            from => Err(InvalidTransitionError::requirement(
                from,
                Action::AssignReviewer,
            )),
        }
    }

    /// `InQaQc → Approved | Rejected`.
    ///
    /// # Errors
    ///
    /// Fails unless the requirement is in QA.
    pub const fn decide(self, outcome: Outcome) -> Result<Self, InvalidTransitionError> {
        match self {
            Self::InQaQc => Ok(outcome.requirement_status()),
            from => Err(InvalidTransitionError::requirement(
                from,
                Action::Decide(outcome),
            )),
        }
    }

    /// Any status back to `Draft`.
    #[must_use]
    pub const fn reopen(self) -> Self {
        Self::Draft
    }

    /// Stable name used in persisted documents and tables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::InQaQc => "InQaQc",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Parses a name produced by [`Self::as_str`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Draft,
            Self::Submitted,
            Self::InQaQc,
            Self::Approved,
            Self::Rejected,
        ]
        .into_iter()
        .find(|status| status.as_str() == name)
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a whole registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RegistryStatus {
    /// Still a draft; never submitted or reopened.
    #[default]
    NotPublished,
    /// Submitted; requirements are going through QA.
    InQaQc,
    /// QA finished on every requirement; awaiting the document-level decision.
    WaitingForApproval,
    /// Accepted as a whole.
    Approved,
    /// Refused as a whole.
    Rejected,
}

impl RegistryStatus {
    /// `NotPublished → InQaQc`.
    ///
    /// # Errors
    ///
    /// Fails if the registry has already been submitted.
    pub const fn submit(self) -> Result<Self, InvalidTransitionError> {
        match self {
            Self::NotPublished => Ok(Self::InQaQc),
            from => Err(InvalidTransitionError::registry(from, Action::Submit)),
        }
    }

    /// `InQaQc → WaitingForApproval`.
    ///
    /// # Errors
    ///
    /// Fails unless the registry is in QA.
    pub const fn request_approval(self) -> Result<Self, InvalidTransitionError> {
        match self {
            Self::InQaQc => Ok(Self::WaitingForApproval),
            from => Err(InvalidTransitionError::registry(
                from,
                Action::RequestApproval,
            )),
        }
    }

    /// `WaitingForApproval → Approved | Rejected`.
    ///
    /// # Errors
    ///
    /// Fails unless the registry is waiting for approval.
    pub const fn decide(self, outcome: Outcome) -> Result<Self, InvalidTransitionError> {
        match self {
            Self::WaitingForApproval => Ok(outcome.registry_status()),
            from => Err(InvalidTransitionError::registry(
                from,
                Action::Decide(outcome),
            )),
        }
    }

    /// Stable name used in persisted documents and tables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotPublished => "NotPublished",
            Self::InQaQc => "InQaQc",
            Self::WaitingForApproval => "WaitingForApproval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Parses a name produced by [`Self::as_str`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::NotPublished,
            Self::InQaQc,
            Self::WaitingForApproval,
            Self::Approved,
            Self::Rejected,
        ]
        .into_iter()
        .find(|status| status.as_str() == name)
    }
}

impl fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Accept.
    Approve,
    /// Refuse.
    Reject,
}

impl Outcome {
    const fn requirement_status(self) -> RequirementStatus {
        match self {
            Self::Approve => RequirementStatus::Approved,
            Self::Reject => RequirementStatus::Rejected,
        }
    }

    const fn registry_status(self) -> RegistryStatus {
        match self {
            Self::Approve => RegistryStatus::Approved,
            Self::Reject => RegistryStatus::Rejected,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("Approve"),
            Self::Reject => f.write_str("Reject"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    /// Accepts `approve`/`reject` in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("approve") {
            Ok(Self::Approve)
        } else if s.eq_ignore_ascii_case("reject") {
            Ok(Self::Reject)
        } else {
            Err(format!("unknown outcome '{s}': expected 'approve' or 'reject'"))
        }
    }
}

/// The command that was attempted when a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Submit for review.
    Submit,
    /// Assign a QA reviewer.
    AssignReviewer,
    /// Approve or reject.
    Decide(Outcome),
    /// Ask for the document-level decision.
    RequestApproval,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => f.write_str("submit"),
            Self::AssignReviewer => f.write_str("assign a QA reviewer"),
            Self::Decide(Outcome::Approve) => f.write_str("approve"),
            Self::Decide(Outcome::Reject) => f.write_str("reject"),
            Self::RequestApproval => f.write_str("request approval"),
        }
    }
}

/// A status change the workflow does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTransitionError {
    /// Refused requirement transition.
    #[error("cannot {action} a requirement in status {from}")]
    Requirement {
        /// Status at the time of the attempt.
        from: RequirementStatus,
        /// The attempted action.
        action: Action,
    },

    /// Refused registry transition.
    #[error("cannot {action} a registry in status {from}")]
    Registry {
        /// Status at the time of the attempt.
        from: RegistryStatus,
        /// The attempted action.
        action: Action,
    },

    /// The registry still has requirements that have not been decided.
    #[error("{pending} requirement(s) have not been approved or rejected")]
    PendingRequirements {
        /// Number of undecided requirements.
        pending: usize,
    },
}

impl InvalidTransitionError {
    const fn requirement(from: RequirementStatus, action: Action) -> Self {
        Self::Requirement { from, action }
    }

    const fn registry(from: RegistryStatus, action: Action) -> Self {
        Self::Registry { from, action }
    }
}
