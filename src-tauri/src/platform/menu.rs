use tauri::menu::{CheckMenuItem, Menu, MenuEvent};
use tauri::{AppHandle, Emitter, EventTarget, WebviewWindow, Wry};
use tracing::{debug, warn};

use haramblur_core::settings::{
    ContextMenu, MenuItemUpdate, VIDEO_MENU_ENABLED_TITLE, VIDEO_MENU_ID,
};
use haramblur_core::HostResult;

use super::window_error;
use crate::app::{DETECTION_EVENT, MAIN_WINDOW_LABEL};

/// Context menu with the single "enable-detection" checkbox
pub struct DetectionMenu {
    menu: Menu<Wry>,
    item: CheckMenuItem<Wry>,
}

impl DetectionMenu {
    pub fn new(app: &AppHandle) -> tauri::Result<Self> {
        let item = CheckMenuItem::with_id(
            app,
            VIDEO_MENU_ID,
            VIDEO_MENU_ENABLED_TITLE,
            true,
            true,
            None::<&str>,
        )?;
        let menu = Menu::with_items(app, &[&item])?;
        Ok(Self { menu, item })
    }

    pub fn popup(&self, window: &WebviewWindow) -> tauri::Result<()> {
        window.popup_menu(&self.menu)
    }

    /// Forwards a click on the checkbox to the page as
    /// `enable-detection` / `disable-detection`.
    pub fn handle_event(&self, app: &AppHandle, event: &MenuEvent) {
        if event.id().as_ref() != VIDEO_MENU_ID {
            return;
        }
        let message = match self.item.is_checked() {
            Ok(true) => "enable-detection",
            Ok(false) => "disable-detection",
            Err(e) => {
                warn!("Cannot read detection checkbox: {}", e);
                return;
            }
        };
        debug!("Detection menu toggled: {}", message);
        if let Err(e) = app.emit_to(
            EventTarget::webview_window(MAIN_WINDOW_LABEL),
            DETECTION_EVENT,
            message,
        ) {
            warn!("Failed to emit {}: {}", DETECTION_EVENT, e);
        }
    }
}

impl ContextMenu for DetectionMenu {
    fn update(&self, id: &str, update: MenuItemUpdate) -> HostResult<()> {
        if self.item.id().as_ref() != id {
            return Err(window_error(format!("unknown menu item {}", id)));
        }
        if let Some(enabled) = update.enabled {
            self.item.set_enabled(enabled).map_err(window_error)?;
        }
        if let Some(checked) = update.checked {
            self.item.set_checked(checked).map_err(window_error)?;
        }
        if let Some(title) = update.title {
            self.item.set_text(title).map_err(window_error)?;
        }
        Ok(())
    }
}
