pub const APP_NAME: &str = env!("APP_NAME");
pub const APP_VERSION: &str = env!("APP_VERSION");
pub const APP_ID: &str = env!("APP_ID");

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const MAIN_PAGE: &str = "index.html";
pub const ONBOARDING_WINDOW_LABEL: &str = "onboarding";

/// tauri-plugin-store file holding the settings record
pub const STORE_FILE: &str = "settings.json";
/// Host config file inside the app config directory
pub const CONFIG_FILE: &str = "desktop.config.json";

pub const EXTENSION_CHANGED_EVENT: &str = "hb:extensionChanged";
pub const DETECTION_EVENT: &str = "hb:detection";
