//! Core of the HaramBlur desktop host.
//!
//! Everything here is platform neutral: the Tauri shell in `src-tauri`
//! implements the collaborator traits (extension host, settings store, main
//! surface, dialogs, menus) and forwards run events into a [`Host`].

pub mod arbiter;
pub mod capability;
pub mod commands;
pub mod config;
pub mod error;
pub mod extension;
pub mod host;
pub mod media;
pub mod router;
pub mod session;
pub mod settings;

#[cfg(test)]
mod testing;

pub use capability::Capability;
pub use config::HostConfig;
pub use error::{HostError, HostResult};
pub use host::{Collaborators, Host};
