//! Session management
//! Owns the one isolated browsing partition of the process. A `persist:`
//! partition is backed by a data directory that survives restarts, so the
//! extension's storage and the settings popup see the same state.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{HostError, HostResult};

pub const PERSIST_PREFIX: &str = "persist:";

/// A named browsing context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    name: String,
    data_dir: Option<PathBuf>,
}

pub type PartitionRef = Arc<Partition>;

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage directory, present only for persistent partitions
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.data_dir.is_some()
    }
}

/// Creates partitions and remembers which names are taken
#[derive(Debug)]
pub struct SessionManager {
    data_root: PathBuf,
    created: Mutex<HashSet<String>>,
}

impl SessionManager {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            created: Mutex::new(HashSet::new()),
        }
    }

    /// Creates the partition `name`. Called once at startup; a second call
    /// with the same name is rejected. Every error is fatal.
    pub fn create_partition(&self, name: &str) -> HostResult<PartitionRef> {
        let storage_name = name.strip_prefix(PERSIST_PREFIX);
        let bare = storage_name.unwrap_or(name);
        if bare.is_empty() || bare.contains(['/', '\\']) || bare == "." || bare == ".." {
            return Err(HostError::PartitionCreate {
                name: name.to_string(),
                reason: "partition name must be a single path segment".to_string(),
            });
        }

        let mut created = self.created.lock();
        if created.contains(name) {
            return Err(HostError::PartitionExists(name.to_string()));
        }

        let data_dir = match storage_name {
            Some(dir_name) => {
                let dir = self.data_root.join("partitions").join(dir_name);
                std::fs::create_dir_all(&dir).map_err(|e| HostError::PartitionCreate {
                    name: name.to_string(),
                    reason: format!("cannot create {}: {}", dir.display(), e),
                })?;
                Some(dir)
            }
            None => None,
        };

        created.insert(name.to_string());
        info!("Created partition {} (storage: {:?})", name, data_dir);

        Ok(Arc::new(Partition {
            name: name.to_string(),
            data_dir,
        }))
    }
}
