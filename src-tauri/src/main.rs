// Prevents additional console window on Windows in release builds
// Without this attribute a GUI launch (including "Open With" on a media file)
// shows a console window next to the browse window
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

/// Main entry point for HaramBlur Desktop
/// The executable only bootstraps; all application logic lives in the library
fn main() {
    // Custom panic handler: log the panic and exit with a failure code instead
    // of leaving a half-initialised webview process behind
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {:?}", panic_info);
        std::process::exit(1);
    }));

    // Delegate to the library crate, which also hosts the mobile entry point
    haramblur_desktop_lib::run();
}
