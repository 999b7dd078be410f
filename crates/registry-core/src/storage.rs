//! Persistence of registries behind the [`RegistryStore`] trait.
//!
//! [`Workflow`](crate::Workflow) never touches the filesystem itself; it reads
//! and writes whole registries through a store. [`InMemoryStore`] backs tests
//! and single sessions, [`DirectoryStore`] keeps one YAML document per
//! registry on disk.

pub mod directory;
mod document;
mod memory;

use std::{io, path::PathBuf};

pub use directory::DirectoryStore;
pub use memory::InMemoryStore;

use crate::domain::{Registry, RegistryId};

/// A repository of registries.
///
/// Implementations must return registries from [`list`](Self::list) in the
/// order they were first saved, and must round-trip every field: requirement
/// order, comment order and history included.
pub trait RegistryStore {
    /// Loads a single registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, id: RegistryId) -> Result<Option<Registry>, StoreError>;

    /// Loads every registry in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn list(&self) -> Result<Vec<Registry>, StoreError>;

    /// Inserts or replaces a registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be written.
    fn save(&mut self, registry: &Registry) -> Result<(), StoreError>;

    /// Removes a registry and everything it contains.
    ///
    /// Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be updated.
    fn delete(&mut self, id: RegistryId) -> Result<bool, StoreError>;
}

/// Failure of a [`RegistryStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// A stored document is not valid YAML for its schema.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// The underlying error.
        source: serde_yaml::Error,
    },

    /// A registry could not be encoded.
    #[error("failed to serialize registry {id}: {source}")]
    Serialize {
        /// The registry being written.
        id: RegistryId,
        /// The underlying error.
        source: serde_yaml::Error,
    },

    /// The registry index could not be encoded.
    #[error("failed to serialize the registry index: {source}")]
    SerializeIndex {
        /// The underlying error.
        source: serde_yaml::Error,
    },

    /// A stored document parsed but holds values the domain rejects.
    #[error("corrupt registry document {}: {reason}", path.display())]
    Corrupt {
        /// The offending file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}
