//! Tauri build script
//! Runs at compile time before the main application is built
//! - Injects app metadata from package.json into Rust code
//! - Processes tauri.conf.json configuration

use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=../package.json");

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let package_json = manifest_dir
        .parent()
        .map(|root| root.join("package.json"))
        .and_then(|path| fs::read_to_string(path).ok())
        .unwrap_or_default();

    let name = extract_json_field(&package_json, "productName")
        .or_else(|| extract_json_field(&package_json, "name"))
        .unwrap_or_else(|| "HaramBlur".to_string());
    let version =
        extract_json_field(&package_json, "version").unwrap_or_else(|| "0.1.0".to_string());

    // lowercase, alphanumeric + hyphens only
    let app_id = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>();

    println!("cargo:rustc-env=APP_NAME={}", name);
    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rustc-env=APP_ID={}", app_id);

    tauri_build::build()
}

// First string value of `"field"` (no serde in the build script)
fn extract_json_field(json: &str, field: &str) -> Option<String> {
    let pattern = format!(r#""{}""#, field);
    let start = json.find(&pattern)?;
    let colon_pos = json[start..].find(':')?;
    let trimmed = json[start + colon_pos + 1..].trim_start();
    let rest = trimmed.strip_prefix('"')?;
    let end_quote = rest.find('"')?;
    Some(rest[..end_quote].to_string())
}
