//! A filesystem backed store of registries.
//!
//! Layout under the root:
//!
//! ```text
//! <root>/config.toml              optional, see [`Config`]
//! <root>/index.yaml               registry ids in insertion order
//! <root>/registries/<uuid>.yaml   one document per registry
//! ```
//!
//! Every write goes to a temporary file first and is then renamed over the
//! target, so a crash never leaves a half-written document behind.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{Config, Registry, RegistryId},
    storage::{RegistryStore, StoreError, document::RegistryDocument},
};

const INDEX_FILE: &str = "index.yaml";
const CONFIG_FILE: &str = "config.toml";
const REGISTRIES_DIR: &str = "registries";

/// A filesystem backed store of registries.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens the store rooted at `root`, creating the directory layout if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let registries = root.join(REGISTRIES_DIR);
        fs::create_dir_all(&registries).map_err(|source| StoreError::Io {
            path: registries,
            source,
        })?;
        tracing::debug!("Opened registry store at {}", root.display());
        Ok(Self { root })
    }

    /// The root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Loads the store's configuration.
    ///
    /// A missing configuration file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_config(&self) -> Result<Config, String> {
        let path = self.config_path();
        if path.exists() {
            Config::load(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    fn registry_path(&self, id: RegistryId) -> PathBuf {
        self.root.join(REGISTRIES_DIR).join(format!("{id}.yaml"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<Vec<RegistryId>, StoreError> {
        let path = self.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let index: Index =
            serde_yaml::from_str(&content).map_err(|source| StoreError::Parse { path, source })?;
        Ok(index.into_ids())
    }

    fn write_index(&self, ids: &[RegistryId]) -> Result<(), StoreError> {
        let content = serde_yaml::to_string(&Index::from_ids(ids))
            .map_err(|source| StoreError::SerializeIndex { source })?;
        write_atomic(&self.index_path(), &content)
    }

    fn load(&self, id: RegistryId) -> Result<Option<Registry>, StoreError> {
        let path = self.registry_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let document: RegistryDocument = serde_yaml::from_str(&content)
            .map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;
        let registry =
            Registry::try_from(document).map_err(|reason| StoreError::Corrupt {
                path: path.clone(),
                reason,
            })?;
        if registry.id() != id {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("document holds registry {}", registry.id()),
            });
        }
        Ok(Some(registry))
    }
}

impl RegistryStore for DirectoryStore {
    fn get(&self, id: RegistryId) -> Result<Option<Registry>, StoreError> {
        self.load(id)
    }

    fn list(&self) -> Result<Vec<Registry>, StoreError> {
        let ids = self.read_index()?;
        tracing::debug!("Loading {} registries", ids.len());

        // `collect` on an indexed parallel iterator keeps the index order.
        let loaded: Vec<_> = ids
            .par_iter()
            .map(|id| {
                self.load(*id)?.ok_or_else(|| StoreError::Corrupt {
                    path: self.index_path(),
                    reason: format!("index names missing registry {id}"),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(loaded)
    }

    fn save(&mut self, registry: &Registry) -> Result<(), StoreError> {
        let id = registry.id();
        let content = serde_yaml::to_string(&RegistryDocument::from(registry))
            .map_err(|source| StoreError::Serialize { id, source })?;
        let mut ids = self.read_index()?;
        let path = self.registry_path(id);
        write_atomic(&path, &content)?;

        if !ids.contains(&id) {
            ids.push(id);
            if let Err(e) = self.write_index(&ids) {
                // Unindexed documents must not outlive a failed save.
                if let Err(cleanup) = fs::remove_file(&path) {
                    tracing::warn!("Failed to remove {}: {cleanup}", path.display());
                }
                return Err(e);
            }
        }
        tracing::debug!("Saved registry {id}");
        Ok(())
    }

    fn delete(&mut self, id: RegistryId) -> Result<bool, StoreError> {
        let mut ids = self.read_index()?;
        let before = ids.len();
        ids.retain(|existing| *existing != id);
        let indexed = ids.len() != before;

        // Move the document aside so it can be put back if the index update
        // fails.
        let path = self.registry_path(id);
        let parked = path.with_extension("yaml.deleted");
        let removed = match fs::rename(&path, &parked) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        if indexed {
            if let Err(e) = self.write_index(&ids) {
                if removed {
                    if let Err(restore) = fs::rename(&parked, &path) {
                        tracing::warn!("Failed to restore {}: {restore}", path.display());
                    }
                }
                return Err(e);
            }
        }

        if removed {
            if let Err(cleanup) = fs::remove_file(&parked) {
                tracing::warn!("Failed to remove {}: {cleanup}", parked.display());
            }
        }
        tracing::debug!("Deleted registry {id}");
        Ok(indexed || removed)
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, content).map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// The serialized versions of the index file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Index {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        registries: Vec<Uuid>,
    },
}

impl Index {
    fn from_ids(ids: &[RegistryId]) -> Self {
        Self::V1 {
            registries: ids.iter().map(RegistryId::as_uuid).collect(),
        }
    }

    fn into_ids(self) -> Vec<RegistryId> {
        match self {
            Self::V1 { registries } => registries.into_iter().map(RegistryId::from).collect(),
        }
    }
}
