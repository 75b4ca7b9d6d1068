//! Tauri implementations of the host collaborator traits
//!
//! - `extensions`: bundle validation and the active-extension registry
//! - `windows`: main surface, secondary windows, onboarding browser
//! - `dialog`: file picker and error notices (tauri-plugin-dialog)
//! - `store`: settings persistence (tauri-plugin-store)
//! - `menu`: the video-detection context menu

pub mod dialog;
pub mod extensions;
pub mod menu;
pub mod store;
pub mod windows;

use tauri::{AppHandle, Manager};

use haramblur_core::media::{self, MediaReference};
use haramblur_core::{HostError, HostResult};

/// Tauri errors raised while managing windows
pub(crate) fn window_error(e: impl std::fmt::Display) -> HostError {
    HostError::Window(e.to_string())
}

/// Pages are served from the app origin and cannot read `file://`, so each
/// accepted file is added to the asset protocol scope and handed out as an
/// asset URL.
pub(crate) fn loadable_uri(app: &AppHandle, reference: &MediaReference) -> HostResult<String> {
    app.asset_protocol_scope()
        .allow_file(&reference.path)
        .map_err(window_error)?;
    Ok(media::asset_url(&reference.path))
}
