/// Application state management module
/// Holds the process-wide host plus the shell-only pieces the command
/// handlers and run events need:
/// - the host (extension lifecycle, settings bridge, file-open router)
/// - the window factory
/// - the detection context menu, when the platform can build one
///
/// Managed once in `setup`; every `#[tauri::command]` reaches it through
/// `State<'_, AppState>`.

use std::sync::Arc;

use haramblur_core::Host;

use crate::platform::menu::DetectionMenu;
use crate::platform::windows::WindowFactory;

/// Central application state container
pub struct AppState {
    host: Arc<Host>,
    menu: Option<Arc<DetectionMenu>>,
    windows: WindowFactory,
}

impl AppState {
    pub fn new(host: Arc<Host>, menu: Option<Arc<DetectionMenu>>, windows: WindowFactory) -> Self {
        Self {
            host,
            menu,
            windows,
        }
    }

    /// Shared handle to the host, for callbacks that outlive a command
    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    pub fn windows(&self) -> &WindowFactory {
        &self.windows
    }

    /// `None` when the platform could not build the context menu
    pub fn menu(&self) -> Option<&Arc<DetectionMenu>> {
        self.menu.as_ref()
    }
}
