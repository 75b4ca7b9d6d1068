// Module declarations
// - app: build-time metadata and window/event names
// - commands: the hb_* IPC commands the pages and the extension invoke
// - platform: Tauri implementations of the core collaborator traits
// - state: the managed AppState
mod app;
mod commands;
mod platform;
mod state;

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::{AppHandle, Manager, RunEvent};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tracing::{error, info, warn};

use haramblur_core::arbiter::{self, ActivationSignal};
use haramblur_core::config::BundleLayout;
use haramblur_core::session::SessionManager;
use haramblur_core::settings::ContextMenu;
use haramblur_core::{Capability, Collaborators, Host, HostConfig};

use app::{APP_ID, APP_NAME, APP_VERSION, CONFIG_FILE};
use platform::dialog::{DialogNotifier, DialogPicker};
use platform::extensions::{ActiveExtension, TauriExtensionHost};
use platform::menu::DetectionMenu;
use platform::store::PluginStore;
use platform::windows::{PartitionBrowser, TauriMainSurface, WindowFactory};
use state::AppState;

/// Main entry point for the Tauri application
/// Sets up logging, plugins and the host, then runs the event loop.
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize tracing; debug builds log the router and lifecycle steps too
    let level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // The single-instance plugin must be registered first so a second launch
    // exits before any other plugin touches shared state.
    let app = tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, argv, cwd| {
            info!("Second launch forwarded with {} argument(s)", argv.len());
            // AppState is managed before anything slow happens in setup, so
            // this only misses launches that arrive while setup itself fails
            let Some(state) = app.try_state::<AppState>() else {
                warn!("Host not ready, dropping forwarded launch");
                return;
            };
            let cwd = Some(PathBuf::from(cwd)).filter(|dir| !dir.as_os_str().is_empty());
            state
                .host()
                .handle_activation(ActivationSignal::SecondInstance { argv, cwd });
        }))
        .plugin(tauri_plugin_dialog::init()) // open dialog and error notices
        .plugin(tauri_plugin_store::Builder::new().build()) // settings record
        .setup(|app| {
            info!("Starting {} v{} ({})", APP_NAME, APP_VERSION, APP_ID);

            // Partition or directory failures are fatal: report them and exit
            // once the user dismisses the dialog.
            if let Err(e) = start_host(app.handle()) {
                error!("Startup failed: {:#}", e);
                report_fatal(app.handle(), &e);
            }
            Ok(())
        })
        .on_menu_event(|app, event| {
            if let Some(menu) = app.try_state::<AppState>().and_then(|s| s.menu().cloned()) {
                menu.handle_event(app, &event);
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::hb_get,
            commands::hb_set,
            commands::hb_open_settings,
            commands::hb_pick_media,
            commands::hb_surface_ready,
            commands::hb_viewer_url,
            commands::hb_extension_message,
            commands::hb_context_menu,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    #[allow(unused_variables)]
    app.run(|app_handle, event| match event {
        RunEvent::ExitRequested { api, code, .. } => {
            // `code` is None when the last window closed. macOS keeps running
            // without windows; everywhere the app also stays up while the main
            // window is torn down to pick up a new extension set.
            let rebuilding = app_handle
                .try_state::<AppState>()
                .is_some_and(|state| state.windows().rebuild_pending());
            if code.is_none() && (rebuilding || !arbiter::exits_when_all_windows_closed()) {
                api.prevent_exit();
            }
        }
        // Files opened through Finder / "Open With"
        #[cfg(target_os = "macos")]
        RunEvent::Opened { urls } => {
            let paths = urls
                .into_iter()
                .filter_map(|url| url.to_file_path().ok())
                .collect::<Vec<_>>();
            match app_handle.try_state::<AppState>() {
                Some(state) => {
                    state
                        .host()
                        .handle_activation(ActivationSignal::OpenedFiles(paths));
                }
                None => warn!("Host not ready, dropping {} opened file(s)", paths.len()),
            }
        }
        // Dock icon clicked with no window open
        #[cfg(target_os = "macos")]
        RunEvent::Reopen { .. } => {
            if let Some(state) = app_handle.try_state::<AppState>() {
                if state.windows().main_window().is_none() {
                    if let Err(e) = state.windows().open_main_window(state.host().clone()) {
                        error!("Failed to recreate main window: {}", e);
                    }
                }
            }
        }
        _ => {}
    });
}

/// Builds the host, loads the extension and opens the main window.
fn start_host(app: &AppHandle) -> anyhow::Result<()> {
    // Config file first: it names the partition and may override the bundle
    let data_root = app
        .path()
        .app_data_dir()
        .context("no application data directory")?;
    let config_path = HostConfig::default_path().unwrap_or_else(|| data_root.join(CONFIG_FILE));
    let config = HostConfig::load(&config_path);

    // Development builds use the checkout next to src-tauri, packaged builds
    // the bundled resources
    let layout = if cfg!(debug_assertions) {
        BundleLayout::Development {
            manifest_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")),
        }
    } else {
        BundleLayout::Packaged {
            resource_dir: app.path().resource_dir().context("no resource directory")?,
        }
    };
    let bundle_path = config.resolve_extension_path(&layout);

    // Window factory, extension host and main surface share the active bundle
    let active = ActiveExtension::default();
    let windows = WindowFactory::new(app.clone(), active.clone());
    let menu = match DetectionMenu::new(app) {
        Ok(menu) => Some(Arc::new(menu)),
        Err(e) => {
            warn!("Context menu unavailable: {}", e);
            None
        }
    };

    let parts = Collaborators {
        extensions: Arc::new(TauriExtensionHost::new(app.clone(), active)),
        notifier: Arc::new(DialogNotifier::new(app.clone())),
        store: Arc::new(PluginStore::new(app.clone())),
        surface: Capability::Available(Arc::new(TauriMainSurface::new(windows.clone()))),
        menu: Capability::from_option(menu.clone().map(|m| m as Arc<dyn ContextMenu>)),
        picker: Capability::Available(Arc::new(DialogPicker::new(app.clone()))),
        windows: Capability::Available(Arc::new(windows.clone())),
        browser: Capability::Available(Arc::new(PartitionBrowser::new(windows.clone()))),
    };

    let sessions = SessionManager::new(&data_root);
    let host = Arc::new(
        Host::new(config, &sessions, bundle_path, parts).context("failed to initialise host")?,
    );

    // Managed before the extension load so second launches and open events
    // arriving meanwhile are queued by the router instead of dropped
    app.manage(AppState::new(host.clone(), menu, windows.clone()));
    host.handle_activation(ActivationSignal::Launch {
        argv: std::env::args().collect(),
    });

    // Windows pick up the extension directory when they are built, so the
    // load has to settle before the main window exists
    let enabled = tauri::async_runtime::block_on(host.extension().enable());
    info!("Extension enabled at startup: {}", enabled);

    // Queued files are pushed once the page invokes hb_surface_ready
    windows.open_main_window(host)?;
    Ok(())
}

/// Environment-fatal errors: tell the user, then exit.
fn report_fatal(app: &AppHandle, err: &anyhow::Error) {
    let handle = app.clone();
    app.dialog()
        .message(format!("{:#}", err))
        .title(format!("{} startup error", APP_NAME))
        .kind(MessageDialogKind::Error)
        .show(move |_| handle.exit(1));
}
