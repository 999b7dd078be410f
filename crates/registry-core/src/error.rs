//! Error types returned by workflow commands.
//!
//! Each failure family has its own type so callers can branch on the cause;
//! [`Error`] wraps them for use with `?`.

use crate::{
    domain::{InvalidTransitionError, RegistryId, RequirementId, ValidationError},
    storage::StoreError,
};

/// Malformed or empty import input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// No rows were supplied.
    #[error("cannot import a registry without rows")]
    NoRows,

    /// The registry name was empty or whitespace.
    #[error("registry name must not be empty")]
    EmptyName,

    /// A row had no attributes at all.
    #[error("row {row} is empty")]
    EmptyRow {
        /// One-based row number.
        row: usize,
    },

    /// A row lacks an attribute the configuration requires.
    #[error("row {row} is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// One-based row number.
        row: usize,
        /// The missing attribute.
        attribute: String,
    },

    /// A row has an attribute the configuration does not declare.
    #[error("row {row} has undeclared attribute '{attribute}'")]
    UndeclaredAttribute {
        /// One-based row number.
        row: usize,
        /// The undeclared attribute.
        attribute: String,
    },
}

/// A registry or requirement that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    /// Unknown registry.
    #[error("registry {0} not found")]
    Registry(RegistryId),

    /// Unknown requirement.
    #[error("requirement {requirement} not found in registry {registry}")]
    Requirement {
        /// The registry that was searched.
        registry: RegistryId,
        /// The missing requirement.
        requirement: RequirementId,
    },
}

/// Any failure of a workflow command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// See [`ImportError`].
    #[error(transparent)]
    Import(#[from] ImportError),

    /// See [`ValidationError`].
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// See [`InvalidTransitionError`].
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    /// See [`NotFoundError`].
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
