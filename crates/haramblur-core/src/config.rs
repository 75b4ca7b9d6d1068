use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Partition shared by the extension, the browse view and the settings popup.
pub const DEFAULT_PARTITION: &str = "persist:haramblur";
/// Key under which the extension keeps its settings record.
pub const SETTINGS_KEY: &str = "hb-settings";
/// Directory name of the unpacked extension bundle.
pub const EXTENSION_DIR_NAME: &str = "HaramBlur";
/// Overrides the bundle location when set.
pub const EXTENSION_PATH_ENV: &str = "HARAMBLUR_EXTENSION_PATH";

const CONFIG_DIR_NAME: &str = "haramblur";
const CONFIG_FILE_NAME: &str = "desktop.config.json";

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Name of the isolated browsing partition
    pub partition: String,

    /// Explicit bundle location; resolved from the build layout when absent
    pub extension_path: Option<PathBuf>,

    /// Settings record key in the persistence store
    pub settings_key: String,

    /// Popup page inside the bundle, relative to the extension origin
    pub popup_page: String,

    /// Opened once when the extension reports a fresh install
    pub onboarding_url: String,

    /// Viewer page served by the UI, relative to the main page
    pub viewer_page: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            partition: DEFAULT_PARTITION.to_string(),
            extension_path: None,
            settings_key: SETTINGS_KEY.to_string(),
            popup_page: "src/popup.html".to_string(),
            onboarding_url: "https://onboard.haramblur.com/".to_string(),
            viewer_page: "viewer.html".to_string(),
        }
    }
}

/// Where the bundle lives relative to the running binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLayout {
    /// Running from a source checkout; the bundle sits next to the workspace.
    Development { manifest_dir: PathBuf },
    /// Installed application; the bundle ships as a resource.
    Packaged { resource_dir: PathBuf },
}

impl HostConfig {
    /// Load configuration from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let config = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<HostConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded host config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Ignoring malformed host config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        config.with_extension_override(std::env::var(EXTENSION_PATH_ENV).ok())
    }

    /// Default config file location (`<config dir>/haramblur/desktop.config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn with_extension_override(mut self, value: Option<String>) -> Self {
        if let Some(path) = value.filter(|v| !v.trim().is_empty()) {
            info!("Extension path overridden by {}: {}", EXTENSION_PATH_ENV, path);
            self.extension_path = Some(PathBuf::from(path.trim()));
        }
        self
    }

    /// Bundle location: explicit setting first, then the build layout.
    pub fn resolve_extension_path(&self, layout: &BundleLayout) -> PathBuf {
        if let Some(path) = &self.extension_path {
            return path.clone();
        }
        match layout {
            BundleLayout::Development { manifest_dir } => manifest_dir
                .parent()
                .unwrap_or(manifest_dir)
                .join(EXTENSION_DIR_NAME),
            BundleLayout::Packaged { resource_dir } => resource_dir.join(EXTENSION_DIR_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = HostConfig::load(&dir.path().join("absent.json"));
        assert_eq!(config.partition, DEFAULT_PARTITION);
        assert_eq!(config.settings_key, SETTINGS_KEY);
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("desktop.config.json");
        std::fs::write(&path, r#"{ "popup_page": "popup/index.html" }"#).unwrap();

        let config = HostConfig::load(&path);
        assert_eq!(config.popup_page, "popup/index.html");
        assert_eq!(config.partition, DEFAULT_PARTITION);
        assert_eq!(config.viewer_page, "viewer.html");
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("desktop.config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = HostConfig::load(&path);
        assert_eq!(config.popup_page, HostConfig::default().popup_page);
    }

    #[test]
    fn test_extension_override() {
        let config = HostConfig::default().with_extension_override(Some(" /opt/hb ".into()));
        assert_eq!(config.extension_path, Some(PathBuf::from("/opt/hb")));

        let config = HostConfig::default().with_extension_override(Some("   ".into()));
        assert_eq!(config.extension_path, None);
    }

    #[test]
    fn test_resolve_extension_path() {
        let config = HostConfig::default();
        let dev = BundleLayout::Development {
            manifest_dir: PathBuf::from("/work/app/src-tauri"),
        };
        assert_eq!(
            config.resolve_extension_path(&dev),
            PathBuf::from("/work/app/HaramBlur")
        );

        let packaged = BundleLayout::Packaged {
            resource_dir: PathBuf::from("/usr/lib/haramblur"),
        };
        assert_eq!(
            config.resolve_extension_path(&packaged),
            PathBuf::from("/usr/lib/haramblur/HaramBlur")
        );

        let pinned = HostConfig {
            extension_path: Some(PathBuf::from("/srv/bundle")),
            ..HostConfig::default()
        };
        assert_eq!(pinned.resolve_extension_path(&dev), PathBuf::from("/srv/bundle"));
    }
}
