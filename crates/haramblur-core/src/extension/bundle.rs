//! Unpacked extension bundles: manifest validation and id derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{HostError, HostResult};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Identifier assigned to a loaded extension; addresses its pages as
/// `chrome-extension://<id>/...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL of `page` inside the extension origin.
    pub fn page_url(&self, page: &str) -> String {
        format!("chrome-extension://{}/{}", self.0, page.trim_start_matches('/'))
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fields of `manifest.json` the host cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BundleManifest {
    pub name: String,
    pub version: String,
    pub manifest_version: u8,
    #[serde(default)]
    pub description: Option<String>,
}

impl BundleManifest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("manifest name is empty".to_string());
        }
        if self.version.trim().is_empty() {
            return Err("manifest version is empty".to_string());
        }
        if !matches!(self.manifest_version, 2 | 3) {
            return Err(format!(
                "unsupported manifest_version {}",
                self.manifest_version
            ));
        }
        Ok(())
    }
}

/// A bundle directory that passed validation
#[derive(Debug, Clone)]
pub struct UnpackedBundle {
    path: PathBuf,
    manifest: BundleManifest,
}

impl UnpackedBundle {
    /// Reads and validates `<path>/manifest.json`.
    pub async fn open(path: &Path) -> HostResult<Self> {
        let load_error = |reason: String| HostError::ExtensionLoad {
            path: path.to_path_buf(),
            reason,
        };

        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| load_error(format!("bundle directory not accessible: {e}")))?;
        let manifest_path = path.join(MANIFEST_FILE);
        let contents = tokio::fs::read_to_string(&manifest_path)
            .await
            .map_err(|e| load_error(format!("cannot read {MANIFEST_FILE}: {e}")))?;

        let manifest: BundleManifest =
            serde_json::from_str(&contents).map_err(|e| HostError::Manifest {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?;
        manifest.validate().map_err(|reason| HostError::Manifest {
            path: manifest_path,
            reason,
        })?;

        Ok(Self { path, manifest })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    pub fn id(&self) -> ExtensionId {
        derive_extension_id(&self.path)
    }

    /// Copies the bundle to `<root>/<bundle dir name>` after emptying `root`,
    /// so a webview scanning `root` finds exactly this extension. Returns the
    /// staged copy; its id follows the staged path.
    pub async fn stage_into(&self, root: &Path) -> HostResult<UnpackedBundle> {
        let stage_error = |reason: String| HostError::ExtensionLoad {
            path: self.path.clone(),
            reason,
        };
        if self.path.starts_with(root) || root.starts_with(&self.path) {
            return Err(stage_error(format!(
                "staging directory {} overlaps the bundle",
                root.display()
            )));
        }

        clear_staging(root)
            .await
            .map_err(|e| stage_error(format!("cannot clear {}: {e}", root.display())))?;
        let name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "extension".into());
        let target = root.join(name);
        copy_dir(&self.path, &target)
            .await
            .map_err(|e| stage_error(format!("cannot copy to {}: {e}", target.display())))?;

        UnpackedBundle::open(&target).await
    }
}

/// Removes a staging root; a missing one is already clear.
pub async fn clear_staging(root: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(root).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

/// Chromium's id for an unpacked extension: SHA-256 of the absolute path,
/// first 16 bytes in hex, with the digits `0-f` spelled `a-p`.
pub fn derive_extension_id(path: &Path) -> ExtensionId {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let id = digest[..16]
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .map(|nibble| char::from(b'a' + nibble))
        .collect::<String>();
    ExtensionId(id)
}
