//! Operations exposed to the renderer.
//!
//! The shell wraps each of these in a `#[tauri::command]`; keeping the logic
//! here lets it run against fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::HostResult;
use crate::host::Host;
use crate::media::{self, media_dialog_filters, DialogFilter, MediaReference};
use crate::session::Partition;

pub const PICK_MEDIA_TITLE: &str = "Open image or video";
pub const SETTINGS_WINDOW_LABEL: &str = "settings";
pub const SETTINGS_WINDOW_TITLE: &str = "HaramBlur Settings";
pub const SETTINGS_WINDOW_WIDTH: f64 = 420.0;
pub const SETTINGS_WINDOW_HEIGHT: f64 = 560.0;

/// Reply to `hb_get`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionState {
    #[serde(rename = "on")]
    pub enabled: bool,
    #[serde(rename = "path")]
    pub bundle_path: String,
}

/// Reply to `hb_set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResult {
    pub on: bool,
}

/// Native single-file open dialog
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// `Ok(None)` means the user cancelled.
    async fn pick_file(&self, title: &str, filters: &[DialogFilter]) -> HostResult<Option<PathBuf>>;
}

/// What to open in an auxiliary window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecondaryWindowRequest {
    pub label: String,
    pub url: String,
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub resizable: bool,
}

/// Opens auxiliary windows bound to a partition
#[async_trait]
pub trait WindowOpener: Send + Sync {
    async fn open(&self, partition: &Partition, request: SecondaryWindowRequest) -> HostResult<()>;
}

impl Host {
    pub fn extension_state(&self) -> ExtensionState {
        ExtensionState {
            enabled: self.extension().status(),
            bundle_path: self.extension().bundle_path().to_string_lossy().to_string(),
        }
    }

    /// Returns the status after the transition settles; a failed load reports
    /// `on: false`. The main surface is rebuilt whenever the status changed.
    pub async fn set_extension_state(&self, enabled: bool) -> ToggleResult {
        info!("Extension toggle requested: {}", enabled);
        let before = self.extension().status();
        let on = if enabled {
            self.extension().enable().await
        } else {
            self.extension().disable().await
        };
        if on != before {
            self.rebuild_surface();
        }
        ToggleResult { on }
    }

    /// Shows the open dialog. Cancellation, dialog failure and files outside
    /// the allow-list all come back as `None`.
    pub async fn pick_media_file(&self) -> Option<MediaReference> {
        let Some(picker) = self.picker.get() else {
            debug!("No file dialog capability");
            return None;
        };

        let path = match picker.pick_file(PICK_MEDIA_TITLE, &media_dialog_filters()).await {
            Ok(Some(path)) => path,
            Ok(None) => return None,
            Err(e) => {
                warn!("File dialog failed: {}", e);
                return None;
            }
        };

        let media = MediaReference::from_candidate(&path);
        if media.is_none() {
            info!("Ignoring picked file {:?}: not a supported media file", path);
        }
        media
    }

    /// Opens the extension popup in a fixed-size window sharing the browse
    /// partition. `false` when no extension is loaded or the window fails.
    pub async fn open_settings_surface(&self) -> bool {
        let Some(id) = self.extension().extension_id() else {
            debug!("Settings requested with no extension loaded");
            return false;
        };
        let Some(windows) = self.windows.get() else {
            debug!("No window capability, cannot open settings");
            return false;
        };

        let request = SecondaryWindowRequest {
            label: SETTINGS_WINDOW_LABEL.to_string(),
            url: id.page_url(&self.config().popup_page),
            title: SETTINGS_WINDOW_TITLE.to_string(),
            width: SETTINGS_WINDOW_WIDTH,
            height: SETTINGS_WINDOW_HEIGHT,
            resizable: false,
        };
        match windows.open(self.partition(), request).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to open settings window: {}", e);
                false
            }
        }
    }

    /// Viewer page address for a media URI
    pub fn viewer_url(&self, uri: &str) -> String {
        media::viewer_url(&self.config().viewer_page, uri)
    }
}
