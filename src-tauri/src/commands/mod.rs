//! Commands invoked by the browse page, the viewer page and the extension.
//! Each one is a thin wrapper over the matching `Host` operation; errors are
//! returned to the webview as strings.

use serde_json::Value;
use tauri::{AppHandle, State};
use tracing::debug;

use haramblur_core::commands::{ExtensionState, ToggleResult};
use haramblur_core::host::ExtensionMessage;

use crate::platform::loadable_uri;
use crate::state::AppState;

/// `{on, path}` of the extension bundle
#[tauri::command]
pub fn hb_get(state: State<'_, AppState>) -> Result<ExtensionState, String> {
    Ok(state.host().extension_state())
}

/// Enables or disables the extension and reports the settled status
#[tauri::command]
pub async fn hb_set(state: State<'_, AppState>, on: bool) -> Result<ToggleResult, String> {
    Ok(state.host().set_extension_state(on).await)
}

#[tauri::command]
pub async fn hb_open_settings(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.host().open_settings_surface().await)
}

/// Asset URL of the picked media file, or null
#[tauri::command]
pub async fn hb_pick_media(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<Option<String>, String> {
    match state.host().pick_media_file().await {
        Some(media) => loadable_uri(&app, &media)
            .map(Some)
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

/// The browse page's listener for `hb:openMedia` is attached. This is the
/// router's only ready signal; page load alone would flush queued files
/// into a page that cannot receive them yet.
#[tauri::command]
pub fn hb_surface_ready(state: State<'_, AppState>) -> Result<(), String> {
    state.host().surface_ready();
    Ok(())
}

#[tauri::command]
pub fn hb_viewer_url(state: State<'_, AppState>, uri: String) -> Result<String, String> {
    Ok(state.host().viewer_url(&uri))
}

/// Runtime messages from the extension (`getSettings`, `video-status`,
/// `reloadExtension`, `onInstalled`); the reply is null when the message
/// expects none.
#[tauri::command]
pub async fn hb_extension_message(
    state: State<'_, AppState>,
    message: Value,
) -> Result<Option<Value>, String> {
    let message = ExtensionMessage::parse(message);
    debug!("Extension message: {:?}", message);
    Ok(state.host().handle_extension_message(message).await)
}

/// Shows the detection context menu over the calling window
#[tauri::command]
pub fn hb_context_menu(
    window: tauri::WebviewWindow,
    state: State<'_, AppState>,
) -> Result<(), String> {
    match state.menu() {
        Some(menu) => menu.popup(&window).map_err(|e| e.to_string()),
        None => Err("context menu is not available".to_string()),
    }
}
