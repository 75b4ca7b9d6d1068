//! Settings bridge between the extension's UI surfaces and the store.
//!
//! The stored record is always merged over [`default_settings`] so keys added
//! in newer bundles have a value even for records saved by older ones.

pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::capability::Capability;
use crate::error::HostResult;

pub use store::JsonFileStore;

/// Context-menu checkbox mirroring video detection
pub const VIDEO_MENU_ID: &str = "enable-detection";
pub const VIDEO_MENU_ENABLED_TITLE: &str = "Enabled for this video";
pub const VIDEO_MENU_DISABLED_TITLE: &str = "Please enable video detection in settings";

/// Key-value persistence for JSON values
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> HostResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> HostResult<()>;
}

/// Partial update of a checkbox menu item; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuItemUpdate {
    pub enabled: Option<bool>,
    pub checked: Option<bool>,
    pub title: Option<String>,
}

pub trait ContextMenu: Send + Sync {
    fn update(&self, id: &str, update: MenuItemUpdate) -> HostResult<()>;
}

/// Why the extension reported `onInstalled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    #[serde(other)]
    Other,
}

pub fn default_settings() -> Map<String, Value> {
    let defaults = json!({
        "status": true,
        "blurryStartMode": false,
        "blurAmount": 20,
        "blurImages": true,
        "blurVideos": true,
        "blurMale": false,
        "blurFemale": true,
        "unblurImages": false,
        "unblurVideos": false,
        "gray": true,
        "strictness": 0.5,
        "whitelist": [],
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Stored keys win; keys only in `defaults` fill the gaps.
pub fn merge(defaults: &Map<String, Value>, stored: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in stored {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Merged settings as handed to the extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsRecord(Map<String, Value>);

impl SettingsRecord {
    pub fn defaults() -> Self {
        Self(default_settings())
    }

    pub fn from_stored(stored: &Map<String, Value>) -> Self {
        Self(merge(&default_settings(), stored))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn status(&self) -> bool {
        self.flag("status")
    }

    pub fn blur_images(&self) -> bool {
        self.flag("blurImages")
    }

    pub fn blur_videos(&self) -> bool {
        self.flag("blurVideos")
    }

    pub fn gray(&self) -> bool {
        self.flag("gray")
    }

    /// Detection threshold, clamped to `0..=1`
    pub fn strictness(&self) -> f64 {
        self.0
            .get("strictness")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0)
    }

    pub fn whitelist(&self) -> BTreeSet<String> {
        self.0
            .get("whitelist")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Video blurring is active only while the filter itself is on.
    pub fn video_detection_enabled(&self) -> bool {
        self.status() && self.blur_videos()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

pub struct SettingsBridge {
    store: Arc<dyn SettingsStore>,
    key: String,
    menu: Capability<Arc<dyn ContextMenu>>,
}

impl SettingsBridge {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        key: impl Into<String>,
        menu: Capability<Arc<dyn ContextMenu>>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            menu,
        }
    }

    /// Stored record merged over the defaults. The first read ever writes the
    /// defaults back so later reads are stable. Store failures degrade to the
    /// defaults.
    pub async fn get_settings(&self) -> SettingsRecord {
        let record = match self.read_stored().await {
            Ok(Some(stored)) => SettingsRecord::from_stored(&stored),
            Ok(None) => {
                let defaults = SettingsRecord::defaults();
                info!("No stored settings under {}, writing defaults", self.key);
                if let Err(e) = self.store.set(&self.key, defaults.clone().into_value()).await {
                    warn!("Failed to write default settings: {}", e);
                }
                defaults
            }
            Err(e) => {
                warn!("Failed to read settings, using defaults: {}", e);
                SettingsRecord::defaults()
            }
        };

        self.reflect_record(&record);
        record
    }

    /// Install/update hook: merge and write back, never clobbering a key the
    /// stored record already has.
    pub async fn on_installed(&self, reason: InstallReason) -> HostResult<SettingsRecord> {
        let record = match self.read_stored().await? {
            Some(stored) => SettingsRecord::from_stored(&stored),
            None => SettingsRecord::defaults(),
        };
        self.store.set(&self.key, record.clone().into_value()).await?;
        info!("Settings merged after {:?}", reason);
        Ok(record)
    }

    /// Advisory: mirrors the video toggle into the context menu. Never fails.
    pub fn notify_video_state(&self, enabled: bool) {
        self.update_menu(MenuItemUpdate {
            checked: Some(enabled),
            ..MenuItemUpdate::default()
        });
    }

    fn reflect_record(&self, record: &SettingsRecord) {
        let enabled = record.video_detection_enabled();
        let title = if enabled {
            VIDEO_MENU_ENABLED_TITLE
        } else {
            VIDEO_MENU_DISABLED_TITLE
        };
        self.update_menu(MenuItemUpdate {
            enabled: Some(enabled),
            checked: Some(enabled),
            title: Some(title.to_string()),
        });
    }

    fn update_menu(&self, update: MenuItemUpdate) {
        match self.menu.get() {
            Some(menu) => {
                if let Err(e) = menu.update(VIDEO_MENU_ID, update) {
                    debug!("Context menu update ignored: {}", e);
                }
            }
            None => debug!("Context menu unavailable, skipping video state"),
        }
    }

    async fn read_stored(&self) -> HostResult<Option<Map<String, Value>>> {
        match self.store.get(&self.key).await? {
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => {
                warn!("Stored settings are not an object ({}), ignoring", other);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, Value>>,
        writes: Mutex<usize>,
        fail_reads: bool,
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn get(&self, key: &str) -> HostResult<Option<Value>> {
            if self.fail_reads {
                return Err(HostError::Store("locked".into()));
            }
            Ok(self.values.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Value) -> HostResult<()> {
            *self.writes.lock() += 1;
            self.values.lock().insert(key.to_string(), value);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMenu {
        updates: Mutex<Vec<MenuItemUpdate>>,
        broken: bool,
    }

    impl ContextMenu for RecordingMenu {
        fn update(&self, id: &str, update: MenuItemUpdate) -> HostResult<()> {
            assert_eq!(id, VIDEO_MENU_ID);
            if self.broken {
                return Err(HostError::Window("menu destroyed".into()));
            }
            self.updates.lock().push(update);
            Ok(())
        }
    }

    fn bridge(store: Arc<MemoryStore>, menu: Option<Arc<RecordingMenu>>) -> SettingsBridge {
        let menu = Capability::from_option(menu.map(|m| m as Arc<dyn ContextMenu>));
        SettingsBridge::new(store, "hb-settings", menu)
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_merge_prefers_stored_keys() {
        let defaults = default_settings();
        let stored = object(json!({ "strictness": 0.9, "legacyKey": "kept" }));

        let merged = merge(&defaults, &stored);
        assert_eq!(merged["strictness"], json!(0.9));
        assert_eq!(merged["legacyKey"], json!("kept"));
        for (key, value) in &defaults {
            if !stored.contains_key(key) {
                assert_eq!(&merged[key], value, "{key}");
            }
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let defaults = default_settings();
        let stored = object(json!({ "status": false, "whitelist": ["example.com"] }));

        let once = merge(&defaults, &stored);
        assert_eq!(merge(&defaults, &once), once);
    }

    #[test]
    fn test_record_accessors() {
        let record = SettingsRecord::from_stored(&object(json!({
            "strictness": 3.0,
            "whitelist": ["b.com", "a.com", 7],
            "blurVideos": false,
        })));
        assert_eq!(record.strictness(), 1.0);
        assert_eq!(
            record.whitelist().into_iter().collect::<Vec<_>>(),
            vec!["a.com", "b.com"]
        );
        assert!(record.status());
        assert!(record.gray());
        assert!(!record.video_detection_enabled());
    }

    #[tokio::test]
    async fn test_first_read_writes_defaults_once() {
        let store = Arc::new(MemoryStore::default());
        let bridge = bridge(store.clone(), None);

        let first = bridge.get_settings().await;
        assert_eq!(first, SettingsRecord::defaults());
        assert_eq!(*store.writes.lock(), 1);

        let second = bridge.get_settings().await;
        assert_eq!(second, first);
        assert_eq!(*store.writes.lock(), 1);
    }

    #[tokio::test]
    async fn test_stored_values_override_defaults() {
        let store = Arc::new(MemoryStore::default());
        store
            .values
            .lock()
            .insert("hb-settings".into(), json!({ "gray": false }));
        let bridge = bridge(store.clone(), None);

        let record = bridge.get_settings().await;
        assert!(!record.gray());
        assert_eq!(record.get("blurAmount"), Some(&json!(20)));
        assert_eq!(*store.writes.lock(), 0);
    }

    #[tokio::test]
    async fn test_non_object_record_is_treated_as_absent() {
        let store = Arc::new(MemoryStore::default());
        store
            .values
            .lock()
            .insert("hb-settings".into(), json!("corrupt"));
        let bridge = bridge(store.clone(), None);

        assert_eq!(bridge.get_settings().await, SettingsRecord::defaults());
        assert_eq!(
            store.values.lock()["hb-settings"],
            SettingsRecord::defaults().into_value()
        );
    }

    #[tokio::test]
    async fn test_read_failure_degrades_to_defaults() {
        let store = Arc::new(MemoryStore {
            fail_reads: true,
            ..MemoryStore::default()
        });
        let bridge = bridge(store.clone(), None);

        assert_eq!(bridge.get_settings().await, SettingsRecord::defaults());
        assert_eq!(*store.writes.lock(), 0);
    }

    #[tokio::test]
    async fn test_on_installed_keeps_stored_keys() {
        let store = Arc::new(MemoryStore::default());
        store.values.lock().insert(
            "hb-settings".into(),
            json!({ "strictness": 0.2, "status": false }),
        );
        let bridge = bridge(store.clone(), None);

        let record = bridge.on_installed(InstallReason::Update).await.unwrap();
        assert_eq!(record.strictness(), 0.2);
        assert!(!record.status());

        let saved = store.values.lock()["hb-settings"].clone();
        assert_eq!(saved["strictness"], json!(0.2));
        assert_eq!(saved["blurImages"], json!(true));
    }

    #[tokio::test]
    async fn test_get_settings_reflects_video_state_into_menu() {
        let store = Arc::new(MemoryStore::default());
        store.values.lock().insert(
            "hb-settings".into(),
            json!({ "status": true, "blurVideos": false }),
        );
        let menu = Arc::new(RecordingMenu::default());
        let bridge = bridge(store, Some(menu.clone()));

        bridge.get_settings().await;
        assert_eq!(
            menu.updates.lock().clone(),
            vec![MenuItemUpdate {
                enabled: Some(false),
                checked: Some(false),
                title: Some(VIDEO_MENU_DISABLED_TITLE.to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_video_status_failures_are_swallowed() {
        let menu = Arc::new(RecordingMenu {
            broken: true,
            ..RecordingMenu::default()
        });
        let bridge = bridge(Arc::new(MemoryStore::default()), Some(menu));
        bridge.notify_video_state(true);

        let bridge = super::SettingsBridge::new(
            Arc::new(MemoryStore::default()),
            "hb-settings",
            Capability::Unavailable,
        );
        bridge.notify_video_state(false);
    }

    #[test]
    fn test_install_reason_parsing() {
        let reason: InstallReason = serde_json::from_value(json!("install")).unwrap();
        assert_eq!(reason, InstallReason::Install);
        let reason: InstallReason = serde_json::from_value(json!("chrome_update")).unwrap();
        assert_eq!(reason, InstallReason::Other);
    }
}
