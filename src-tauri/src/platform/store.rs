use async_trait::async_trait;
use serde_json::Value;
use tauri::AppHandle;
use tauri_plugin_store::StoreExt;

use haramblur_core::settings::SettingsStore;
use haramblur_core::{HostError, HostResult};

use crate::app::STORE_FILE;

/// Settings record kept in the tauri-plugin-store file
pub struct PluginStore {
    app: AppHandle,
}

impl PluginStore {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl SettingsStore for PluginStore {
    async fn get(&self, key: &str) -> HostResult<Option<Value>> {
        let store = self
            .app
            .store(STORE_FILE)
            .map_err(|e| HostError::Store(e.to_string()))?;
        Ok(store.get(key))
    }

    async fn set(&self, key: &str, value: Value) -> HostResult<()> {
        let store = self
            .app
            .store(STORE_FILE)
            .map_err(|e| HostError::Store(e.to_string()))?;
        store.set(key, value);
        store.save().map_err(|e| HostError::Store(e.to_string()))
    }
}
