//! Recording fakes for the collaborator traits, shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use crate::capability::Capability;
use crate::commands::{FilePicker, SecondaryWindowRequest, WindowOpener};
use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::extension::{ExtensionHost, ExtensionId, LoadedExtension, Notifier};
use crate::host::{Browser, Collaborators, Host, MainSurface};
use crate::media::{DialogFilter, MediaReference};
use crate::session::{Partition, SessionManager};
use crate::settings::{ContextMenu, MenuItemUpdate, SettingsStore};

#[derive(Default)]
pub struct FakeExtensionHost {
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
}

#[async_trait]
impl ExtensionHost for FakeExtensionHost {
    async fn load(&self, _partition: &Partition, _bundle: &Path) -> HostResult<LoadedExtension> {
        let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LoadedExtension {
            id: ExtensionId::new(format!("ext{n}")),
            name: "HaramBlur".into(),
            version: "1.0.0".into(),
        })
    }

    async fn unload(&self, _partition: &Partition, _id: &ExtensionId) -> HostResult<()> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn show_error(&self, _title: &str, _message: &str) {}
}

#[derive(Default)]
pub struct MemoryStore {
    pub values: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> HostResult<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> HostResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    OpenMedia(String),
    Focus,
    Rebuild,
}

#[derive(Default)]
pub struct RecordingSurface {
    pub calls: Mutex<Vec<SurfaceCall>>,
}

impl MainSurface for RecordingSurface {
    fn push_open_media(&self, media: &MediaReference) -> HostResult<()> {
        self.calls.lock().push(SurfaceCall::OpenMedia(media.uri.clone()));
        Ok(())
    }

    fn focus(&self) -> HostResult<()> {
        self.calls.lock().push(SurfaceCall::Focus);
        Ok(())
    }

    fn rebuild(&self) -> HostResult<()> {
        self.calls.lock().push(SurfaceCall::Rebuild);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMenu {
    pub updates: Mutex<Vec<MenuItemUpdate>>,
}

impl ContextMenu for RecordingMenu {
    fn update(&self, _id: &str, update: MenuItemUpdate) -> HostResult<()> {
        self.updates.lock().push(update);
        Ok(())
    }
}

/// Returns a queued answer per call; `None` simulates a cancelled dialog.
#[derive(Default)]
pub struct ScriptedPicker {
    pub answers: Mutex<Vec<HostResult<Option<PathBuf>>>>,
    pub filters_seen: Mutex<Vec<DialogFilter>>,
}

#[async_trait]
impl FilePicker for ScriptedPicker {
    async fn pick_file(&self, _title: &str, filters: &[DialogFilter]) -> HostResult<Option<PathBuf>> {
        *self.filters_seen.lock() = filters.to_vec();
        let mut answers = self.answers.lock();
        if answers.is_empty() {
            return Ok(None);
        }
        answers.remove(0)
    }
}

#[derive(Default)]
pub struct RecordingWindows {
    pub opened: Mutex<Vec<(String, SecondaryWindowRequest)>>,
    pub fail: bool,
}

#[async_trait]
impl WindowOpener for RecordingWindows {
    async fn open(&self, partition: &Partition, request: SecondaryWindowRequest) -> HostResult<()> {
        if self.fail {
            return Err(HostError::Window("page failed to load".into()));
        }
        self.opened
            .lock()
            .push((partition.name().to_string(), request));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingBrowser {
    pub urls: Mutex<Vec<String>>,
}

impl Browser for RecordingBrowser {
    fn open_url(&self, _partition: &Partition, url: &str) -> HostResult<()> {
        self.urls.lock().push(url.to_string());
        Ok(())
    }
}

/// A host wired to recording fakes, with handles to inspect them.
pub struct TestHost {
    pub _root: TempDir,
    pub host: Host,
    pub extensions: Arc<FakeExtensionHost>,
    pub store: Arc<MemoryStore>,
    pub surface: Arc<RecordingSurface>,
    pub menu: Arc<RecordingMenu>,
    pub picker: Arc<ScriptedPicker>,
    pub windows: Arc<RecordingWindows>,
    pub browser: Arc<RecordingBrowser>,
}

pub fn test_host() -> TestHost {
    test_host_with(RecordingWindows::default())
}

pub fn test_host_with(windows: RecordingWindows) -> TestHost {
    let root = tempfile::tempdir().unwrap();
    let sessions = SessionManager::new(root.path());

    let extensions = Arc::new(FakeExtensionHost::default());
    let store = Arc::new(MemoryStore::default());
    let surface = Arc::new(RecordingSurface::default());
    let menu = Arc::new(RecordingMenu::default());
    let picker = Arc::new(ScriptedPicker::default());
    let windows = Arc::new(windows);
    let browser = Arc::new(RecordingBrowser::default());

    let parts = Collaborators {
        extensions: extensions.clone(),
        notifier: Arc::new(SilentNotifier),
        store: store.clone(),
        surface: Capability::Available(surface.clone()),
        menu: Capability::Available(menu.clone()),
        picker: Capability::Available(picker.clone()),
        windows: Capability::Available(windows.clone()),
        browser: Capability::Available(browser.clone()),
    };
    let host = Host::new(
        HostConfig::default(),
        &sessions,
        PathBuf::from("/opt/HaramBlur"),
        parts,
    )
    .unwrap();

    TestHost {
        _root: root,
        host,
        extensions,
        store,
        surface,
        menu,
        picker,
        windows,
        browser,
    }
}
