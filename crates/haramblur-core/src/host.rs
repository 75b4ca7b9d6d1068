//! The process-scoped host state.
//!
//! [`Host`] owns the partition, the extension controller, the settings
//! bridge and the file-open router, and is the single dispatch point for
//! activation signals, surface lifecycle events and extension messages. The
//! shell keeps one instance in its managed state; tests build isolated ones.

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::arbiter::{ActivationPolicy, ActivationSignal};
use crate::capability::Capability;
use crate::commands::{FilePicker, WindowOpener};
use crate::config::HostConfig;
use crate::error::HostResult;
use crate::extension::{ExtensionController, ExtensionHost, Notifier};
use crate::media::MediaReference;
use crate::router::{FileOpenRouter, RouterEffect, RouterEvent};
use crate::session::{Partition, PartitionRef, SessionManager};
use crate::settings::{ContextMenu, InstallReason, SettingsBridge, SettingsStore};

/// Push event carrying a media URI to the main surface
pub const OPEN_MEDIA_EVENT: &str = "hb:openMedia";

/// The main browse window
pub trait MainSurface: Send + Sync {
    fn push_open_media(&self, media: &MediaReference) -> HostResult<()>;
    fn focus(&self) -> HostResult<()>;
    /// Recreates the surface so its webview runs with the extension set the
    /// controller reports. The shell signals `SurfaceClosed` and
    /// `SurfaceCreated` around the rebuild.
    fn rebuild(&self) -> HostResult<()>;
}

/// Opens a URL in a page of the partition (onboarding)
pub trait Browser: Send + Sync {
    fn open_url(&self, partition: &Partition, url: &str) -> HostResult<()>;
}

/// Messages the loaded extension sends to the host, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ExtensionMessage {
    #[serde(rename = "getSettings")]
    GetSettings,
    #[serde(rename = "video-status")]
    VideoStatus {
        #[serde(default, deserialize_with = "truthy")]
        status: bool,
    },
    #[serde(rename = "reloadExtension")]
    ReloadExtension,
    #[serde(rename = "onInstalled")]
    OnInstalled { reason: InstallReason },
    #[serde(other)]
    Unknown,
}

/// JavaScript truthiness, so `{"status": 1}` reads as `true`.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl ExtensionMessage {
    /// Malformed messages are treated like unknown ones.
    pub fn parse(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            debug!("Unrecognised extension message: {}", e);
            ExtensionMessage::Unknown
        })
    }
}

/// Platform implementations the host delegates to
pub struct Collaborators {
    pub extensions: Arc<dyn ExtensionHost>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn SettingsStore>,
    pub surface: Capability<Arc<dyn MainSurface>>,
    pub menu: Capability<Arc<dyn ContextMenu>>,
    pub picker: Capability<Arc<dyn FilePicker>>,
    pub windows: Capability<Arc<dyn WindowOpener>>,
    pub browser: Capability<Arc<dyn Browser>>,
}

pub struct Host {
    config: HostConfig,
    extension: ExtensionController,
    settings: SettingsBridge,
    router: Mutex<FileOpenRouter>,
    activation: ActivationPolicy,
    surface: Capability<Arc<dyn MainSurface>>,
    pub(crate) picker: Capability<Arc<dyn FilePicker>>,
    pub(crate) windows: Capability<Arc<dyn WindowOpener>>,
    browser: Capability<Arc<dyn Browser>>,
}

impl Host {
    /// Creates the partition and wires the components. A partition failure is
    /// returned as a fatal error; the caller is expected to exit.
    pub fn new(
        config: HostConfig,
        sessions: &SessionManager,
        bundle_path: PathBuf,
        parts: Collaborators,
    ) -> HostResult<Self> {
        let partition = sessions.create_partition(&config.partition)?;
        info!(
            "Host ready: partition {}, bundle {:?}",
            partition.name(),
            bundle_path
        );

        let extension =
            ExtensionController::new(partition, bundle_path, parts.extensions, parts.notifier);
        let settings = SettingsBridge::new(parts.store, config.settings_key.clone(), parts.menu);

        Ok(Self {
            config,
            extension,
            settings,
            router: Mutex::new(FileOpenRouter::new()),
            activation: ActivationPolicy::for_current_platform(),
            surface: parts.surface,
            picker: parts.picker,
            windows: parts.windows,
            browser: parts.browser,
        })
    }

    /// Overrides the platform's file-open source.
    pub fn with_activation_policy(mut self, policy: ActivationPolicy) -> Self {
        self.activation = policy;
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn partition(&self) -> &PartitionRef {
        self.extension.partition()
    }

    pub fn extension(&self) -> &ExtensionController {
        &self.extension
    }

    pub fn settings(&self) -> &SettingsBridge {
        &self.settings
    }

    /// Startup arguments, second launches and OS open events all land here.
    pub fn handle_activation(&self, signal: ActivationSignal) -> Vec<RouterEffect> {
        let references = self.activation.references(&signal);
        debug!(
            "Activation {:?} produced {} media reference(s)",
            signal,
            references.len()
        );

        let mut effects = self.route(references.into_iter().map(RouterEvent::Deliver));
        if self.activation.requests_focus(&signal) && !effects.contains(&RouterEffect::Focus) {
            self.apply(&[RouterEffect::Focus]);
            effects.push(RouterEffect::Focus);
        }
        effects
    }

    pub fn deliver(&self, media: MediaReference) -> Vec<RouterEffect> {
        self.route([RouterEvent::Deliver(media)])
    }

    pub fn surface_created(&self) {
        self.route([RouterEvent::SurfaceCreated]);
    }

    /// The surface's `hb:openMedia` listener is attached. Page load is not
    /// enough: pushes sent before the listener exists are lost, so the shell
    /// only calls this from the page's own ready command.
    pub fn surface_ready(&self) -> Vec<RouterEffect> {
        self.route([RouterEvent::SurfaceReady])
    }

    pub fn surface_closed(&self) {
        self.route([RouterEvent::SurfaceClosed]);
    }

    fn route(&self, events: impl IntoIterator<Item = RouterEvent>) -> Vec<RouterEffect> {
        let effects = {
            let mut router = self.router.lock();
            events
                .into_iter()
                .flat_map(|event| router.handle(event))
                .collect::<Vec<_>>()
        };
        self.apply(&effects);
        effects
    }

    fn apply(&self, effects: &[RouterEffect]) {
        let Some(surface) = self.surface.get() else {
            if !effects.is_empty() {
                debug!("No main surface capability, dropping {} effect(s)", effects.len());
            }
            return;
        };

        for effect in effects {
            match effect {
                RouterEffect::OpenMedia(media) => {
                    info!("Opening {} in the viewer", media.uri);
                    if let Err(e) = surface.push_open_media(media) {
                        warn!("Failed to push {} to the main surface: {}", media.uri, e);
                    }
                }
                RouterEffect::Focus => {
                    if let Err(e) = surface.focus() {
                        debug!("Focus request ignored: {}", e);
                    }
                }
            }
        }
    }

    /// Handles one message from the extension; the return value is the reply,
    /// if the message expects one.
    pub async fn handle_extension_message(&self, message: ExtensionMessage) -> Option<Value> {
        match message {
            ExtensionMessage::GetSettings => {
                Some(self.settings.get_settings().await.into_value())
            }
            ExtensionMessage::VideoStatus { status } => {
                self.settings.notify_video_state(status);
                None
            }
            ExtensionMessage::ReloadExtension => {
                self.extension.reload().await;
                self.rebuild_surface();
                None
            }
            ExtensionMessage::OnInstalled { reason } => {
                if let Err(e) = self.settings.on_installed(reason).await {
                    warn!("Failed to merge settings on {:?}: {}", reason, e);
                }
                if reason == InstallReason::Install {
                    self.open_onboarding();
                }
                None
            }
            ExtensionMessage::Unknown => None,
        }
    }

    /// Called after the extension set changed.
    pub(crate) fn rebuild_surface(&self) {
        match self.surface.get() {
            Some(surface) => {
                if let Err(e) = surface.rebuild() {
                    warn!("Main surface not rebuilt after extension change: {}", e);
                }
            }
            None => debug!("No main surface capability, nothing to rebuild"),
        }
    }

    fn open_onboarding(&self) {
        match self.browser.get() {
            Some(browser) => {
                if let Err(e) = browser.open_url(self.partition(), &self.config.onboarding_url) {
                    debug!("Onboarding page not opened: {}", e);
                }
            }
            None => debug!("No browser capability, skipping onboarding page"),
        }
    }
}
