use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tauri::webview::PageLoadEvent;
use tauri::{
    AppHandle, Emitter, EventTarget, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder, Wry,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use haramblur_core::commands::{SecondaryWindowRequest, WindowOpener};
use haramblur_core::host::{Browser, MainSurface, OPEN_MEDIA_EVENT};
use haramblur_core::media::MediaReference;
use haramblur_core::session::Partition;
use haramblur_core::{Host, HostError, HostResult};

use super::extensions::ActiveExtension;
use super::{loadable_uri, window_error};
use crate::app::{APP_NAME, MAIN_PAGE, MAIN_WINDOW_LABEL, ONBOARDING_WINDOW_LABEL};

/// Builds webview windows bound to a partition with the active extension
#[derive(Clone)]
pub struct WindowFactory {
    app: AppHandle,
    active: ActiveExtension,
    // set from the destroy request until the replacement main window exists
    rebuilding: Arc<AtomicBool>,
}

impl WindowFactory {
    pub fn new(app: AppHandle, active: ActiveExtension) -> Self {
        Self {
            app,
            active,
            rebuilding: Arc::new(AtomicBool::new(false)),
        }
    }

    fn builder<'a>(
        &'a self,
        partition: &Partition,
        label: &str,
        url: WebviewUrl,
    ) -> WebviewWindowBuilder<'a, Wry, AppHandle> {
        let mut builder = WebviewWindowBuilder::new(&self.app, label, url);
        if let Some(dir) = partition.data_dir() {
            builder = builder.data_directory(dir.to_path_buf());
        }
        if let Some(bundle) = self.active.current() {
            builder = builder
                .browser_extensions_enabled(true)
                .extensions_path(bundle.search_root());
        }
        builder
    }

    pub fn main_window(&self) -> Option<WebviewWindow> {
        self.app.get_webview_window(MAIN_WINDOW_LABEL)
    }

    /// Creates the main browse window and tells the router about it. The
    /// router only flushes once the page invokes `hb_surface_ready`.
    pub fn open_main_window(&self, host: Arc<Host>) -> tauri::Result<WebviewWindow> {
        host.surface_created();
        let built = self
            .builder(
                host.partition(),
                MAIN_WINDOW_LABEL,
                WebviewUrl::App(MAIN_PAGE.into()),
            )
            .title(APP_NAME)
            .inner_size(1200.0, 800.0)
            .build();
        let window = match built {
            Ok(window) => window,
            Err(e) => {
                host.surface_closed();
                return Err(e);
            }
        };

        let factory = self.clone();
        window.on_window_event(move |event| {
            if let tauri::WindowEvent::Destroyed = event {
                info!("Main window destroyed");
                host.surface_closed();
                if factory.rebuild_pending() {
                    factory.replace_main_window(host.clone());
                }
            }
        });
        Ok(window)
    }

    /// Whether the main window is being replaced; the app must not exit
    /// while it has no windows for that reason.
    pub fn rebuild_pending(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }

    /// Destroys the main window; its destroy handler builds the replacement
    /// with the extension set active at that point.
    fn request_rebuild(&self) -> HostResult<()> {
        let Some(window) = self.main_window() else {
            debug!("No main window to rebuild");
            return Ok(());
        };
        if self.rebuilding.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Rebuilding main window for the new extension set");
        window.destroy().map_err(|e| {
            self.rebuilding.store(false, Ordering::SeqCst);
            window_error(e)
        })
    }

    fn replace_main_window(&self, host: Arc<Host>) {
        let factory = self.clone();
        let scheduled = self.app.run_on_main_thread(move || {
            if let Err(e) = factory.open_main_window(host) {
                warn!("Failed to rebuild main window: {}", e);
            }
            factory.rebuilding.store(false, Ordering::SeqCst);
        });
        if let Err(e) = scheduled {
            warn!("Failed to schedule main window rebuild: {}", e);
            self.rebuilding.store(false, Ordering::SeqCst);
        }
    }

    /// Builds on the main thread and waits for the first finished page load.
    async fn open_and_wait(
        &self,
        partition: &Partition,
        request: SecondaryWindowRequest,
        url: tauri::Url,
    ) -> HostResult<()> {
        let (loaded_tx, loaded_rx) = oneshot::channel::<()>();
        let loaded_tx = Arc::new(Mutex::new(Some(loaded_tx)));
        let (built_tx, built_rx) = oneshot::channel::<HostResult<()>>();

        let factory = self.clone();
        let partition = partition.clone();
        self.app
            .run_on_main_thread(move || {
                let built = factory
                    .builder(&partition, &request.label, WebviewUrl::External(url))
                    .title(request.title)
                    .inner_size(request.width, request.height)
                    .resizable(request.resizable)
                    .on_page_load(move |_window, payload| {
                        if payload.event() == PageLoadEvent::Finished {
                            if let Some(tx) = loaded_tx.lock().take() {
                                let _ = tx.send(());
                            }
                        }
                    })
                    .build();
                let _ = built_tx.send(built.map(|_| ()).map_err(window_error));
            })
            .map_err(window_error)?;

        built_rx
            .await
            .map_err(|_| HostError::Window("window builder was dropped".to_string()))??;
        loaded_rx
            .await
            .map_err(|_| HostError::Window("window closed before its page loaded".to_string()))
    }

    fn focus_existing(&self, label: &str) -> bool {
        match self.app.get_webview_window(label) {
            Some(window) => {
                if let Err(e) = window.set_focus() {
                    debug!("Focus on {} ignored: {}", label, e);
                }
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl WindowOpener for WindowFactory {
    async fn open(&self, partition: &Partition, request: SecondaryWindowRequest) -> HostResult<()> {
        if self.focus_existing(&request.label) {
            return Ok(());
        }

        let url: tauri::Url = request.url.parse().map_err(window_error)?;
        info!("Opening {} window at {}", request.label, request.url);
        self.open_and_wait(partition, request, url).await
    }
}

/// The main window as seen by the router
pub struct TauriMainSurface {
    factory: WindowFactory,
}

impl TauriMainSurface {
    pub fn new(factory: WindowFactory) -> Self {
        Self { factory }
    }

    fn window(&self) -> HostResult<WebviewWindow> {
        self.factory
            .main_window()
            .ok_or_else(|| HostError::Window("main window is gone".to_string()))
    }
}

impl MainSurface for TauriMainSurface {
    fn push_open_media(&self, media: &MediaReference) -> HostResult<()> {
        self.window()?;
        let uri = loadable_uri(&self.factory.app, media)?;
        self.factory
            .app
            .emit_to(
                EventTarget::webview_window(MAIN_WINDOW_LABEL),
                OPEN_MEDIA_EVENT,
                uri,
            )
            .map_err(window_error)
    }

    fn focus(&self) -> HostResult<()> {
        let window = self.window()?;
        if window.is_minimized().unwrap_or(false) {
            window.unminimize().map_err(window_error)?;
        }
        window.show().map_err(window_error)?;
        window.set_focus().map_err(window_error)
    }

    fn rebuild(&self) -> HostResult<()> {
        self.factory.request_rebuild()
    }
}

/// Opens pages such as onboarding in their own window of the partition
pub struct PartitionBrowser {
    factory: WindowFactory,
}

impl PartitionBrowser {
    pub fn new(factory: WindowFactory) -> Self {
        Self { factory }
    }
}

impl Browser for PartitionBrowser {
    fn open_url(&self, partition: &Partition, url: &str) -> HostResult<()> {
        let parsed: tauri::Url = url.parse().map_err(window_error)?;
        if let Some(window) = self.factory.app.get_webview_window(ONBOARDING_WINDOW_LABEL) {
            return window.navigate(parsed).map_err(window_error);
        }

        let factory = self.factory.clone();
        let partition = partition.clone();
        self.factory
            .app
            .run_on_main_thread(move || {
                let built = factory
                    .builder(&partition, ONBOARDING_WINDOW_LABEL, WebviewUrl::External(parsed))
                    .title(APP_NAME)
                    .inner_size(1000.0, 760.0)
                    .build();
                if let Err(e) = built {
                    warn!("Failed to open onboarding window: {}", e);
                }
            })
            .map_err(window_error)
    }
}
