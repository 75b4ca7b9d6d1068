use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager};
use tracing::{info, warn};

use haramblur_core::extension::{
    clear_staging, ExtensionHost, ExtensionId, LoadedExtension, UnpackedBundle,
};
use haramblur_core::session::Partition;
use haramblur_core::{HostError, HostResult};

use crate::app::EXTENSION_CHANGED_EVENT;

/// Staged copies live under `<partition data dir>/extensions`
const STAGING_DIR: &str = "extensions";

/// The bundle currently installed into the partition
#[derive(Debug, Clone, Serialize)]
pub struct ActiveBundle {
    pub id: ExtensionId,
    /// The staged copy the webview loads
    pub path: PathBuf,
    search_root: PathBuf,
}

impl ActiveBundle {
    /// Directory the webview scans for unpacked extensions; holds only `path`
    pub fn search_root(&self) -> &Path {
        &self.search_root
    }
}

/// Shared view of the active bundle, read by the window builders
#[derive(Debug, Clone, Default)]
pub struct ActiveExtension(Arc<RwLock<Option<ActiveBundle>>>);

impl ActiveExtension {
    pub fn current(&self) -> Option<ActiveBundle> {
        self.0.read().clone()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionChanged {
    partition: String,
    extension: Option<LoadedExtension>,
}

/// Webviews read their extension directory when they are created, so
/// loading stages the bundle and records it for every window built
/// afterwards. The host rebuilds the main window once the change settles.
pub struct TauriExtensionHost {
    app: AppHandle,
    active: ActiveExtension,
}

impl TauriExtensionHost {
    pub fn new(app: AppHandle, active: ActiveExtension) -> Self {
        Self { app, active }
    }

    fn staging_root(&self, partition: &Partition) -> HostResult<PathBuf> {
        match partition.data_dir() {
            Some(dir) => Ok(dir.join(STAGING_DIR)),
            None => self
                .app
                .path()
                .app_cache_dir()
                .map(|dir| {
                    dir.join(STAGING_DIR)
                        .join(partition.name().replace(':', "_"))
                })
                .map_err(|e| HostError::ExtensionLoad {
                    path: PathBuf::from(STAGING_DIR),
                    reason: e.to_string(),
                }),
        }
    }

    fn announce(&self, partition: &Partition, extension: Option<LoadedExtension>) {
        let payload = ExtensionChanged {
            partition: partition.name().to_string(),
            extension,
        };
        if let Err(e) = self.app.emit(EXTENSION_CHANGED_EVENT, payload) {
            warn!("Failed to emit {}: {}", EXTENSION_CHANGED_EVENT, e);
        }
    }
}

#[async_trait]
impl ExtensionHost for TauriExtensionHost {
    async fn load(&self, partition: &Partition, bundle: &Path) -> HostResult<LoadedExtension> {
        let source = UnpackedBundle::open(bundle).await?;
        let root = self.staging_root(partition)?;
        let bundle = source.stage_into(&root).await?;
        let loaded = LoadedExtension {
            id: bundle.id(),
            name: bundle.manifest().name.clone(),
            version: bundle.manifest().version.clone(),
        };

        *self.active.0.write() = Some(ActiveBundle {
            id: loaded.id.clone(),
            path: bundle.path().to_path_buf(),
            search_root: root,
        });
        info!(
            "Installed {} {} into {} as {}",
            loaded.name,
            loaded.version,
            partition.name(),
            loaded.id
        );

        self.announce(partition, Some(loaded.clone()));
        Ok(loaded)
    }

    async fn unload(&self, partition: &Partition, id: &ExtensionId) -> HostResult<()> {
        let removed = {
            let mut active = self.active.0.write();
            match active.take() {
                Some(bundle) if &bundle.id == id => bundle,
                other => {
                    *active = other;
                    return Err(HostError::ExtensionUnload {
                        id: id.to_string(),
                        reason: "not installed in this partition".to_string(),
                    });
                }
            }
        };

        // The live webview may still hold files open; the next load clears it.
        if let Err(e) = clear_staging(removed.search_root()).await {
            warn!(
                "Staged copy {} not removed: {}",
                removed.search_root().display(),
                e
            );
        }
        info!("Removed extension {} from {}", id, partition.name());
        self.announce(partition, None);
        Ok(())
    }
}
