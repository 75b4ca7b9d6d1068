use async_trait::async_trait;
use std::path::PathBuf;
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tokio::sync::oneshot;
use tracing::error;

use haramblur_core::commands::FilePicker;
use haramblur_core::extension::Notifier;
use haramblur_core::media::DialogFilter;
use haramblur_core::{HostError, HostResult};

/// Native open-file dialog
pub struct DialogPicker {
    app: AppHandle,
}

impl DialogPicker {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl FilePicker for DialogPicker {
    async fn pick_file(&self, title: &str, filters: &[DialogFilter]) -> HostResult<Option<PathBuf>> {
        let mut dialog = self.app.dialog().file().set_title(title);
        for filter in filters {
            let extensions: Vec<&str> = filter.extensions.iter().map(String::as_str).collect();
            dialog = dialog.add_filter(filter.name.clone(), &extensions);
        }

        let (tx, rx) = oneshot::channel();
        dialog.pick_file(move |picked| {
            let _ = tx.send(picked);
        });

        let picked = rx
            .await
            .map_err(|_| HostError::Dialog("dialog closed without a result".to_string()))?;
        picked
            .map(|path| path.into_path().map_err(|e| HostError::Dialog(e.to_string())))
            .transpose()
    }
}

/// Error notices as native message boxes
pub struct DialogNotifier {
    app: AppHandle,
}

impl DialogNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Notifier for DialogNotifier {
    fn show_error(&self, title: &str, message: &str) {
        error!("{}: {}", title, message);
        self.app
            .dialog()
            .message(message)
            .title(title)
            .kind(MessageDialogKind::Error)
            .show(|_| {});
    }
}
