//! Single-instance arbitration and activation handling.
//!
//! The first process to take the instance lock becomes primary. Later
//! launches forward their arguments to it and exit. The primary turns each
//! forwarded launch (or, on macOS, each "opened with" event) into media
//! references for the file-open router.

use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::HostResult;
use crate::media::{resolve_candidates_in, MediaReference};

/// Process-wide exclusivity lock plus the channel to the lock holder.
pub trait InstanceLock {
    /// `true` when this process now holds the lock.
    fn try_acquire(&self) -> HostResult<bool>;

    /// Hands `args` to the running primary instance.
    fn forward(&self, args: &[String]) -> HostResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    /// Arguments were forwarded; the process must exit without side effects.
    Secondary,
}

/// Decides the role of this process.
///
/// A lock that cannot be queried at all makes this process primary.
pub fn acquire(lock: &dyn InstanceLock, args: &[String]) -> Role {
    match lock.try_acquire() {
        Ok(true) => {
            info!("Acquired single-instance lock");
            Role::Primary
        }
        Ok(false) => {
            if let Err(e) = lock.forward(args) {
                warn!("Failed to forward arguments to the primary instance: {}", e);
            }
            Role::Secondary
        }
        Err(e) => {
            warn!("Single-instance lock unavailable, continuing as primary: {}", e);
            Role::Primary
        }
    }
}

/// Where the platform delivers "open this file" requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOpenSource {
    /// Paths arrive in the argument list (Windows, Linux)
    Argv,
    /// Paths arrive as a dedicated "opened" event (macOS)
    NativeEvent,
}

impl FileOpenSource {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            FileOpenSource::NativeEvent
        } else {
            FileOpenSource::Argv
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationSignal {
    /// The primary's own startup arguments
    Launch { argv: Vec<String> },
    /// A later launch attempt, forwarded by the instance lock
    SecondInstance {
        argv: Vec<String>,
        cwd: Option<PathBuf>,
    },
    /// OS "open with" delivery
    OpenedFiles(Vec<PathBuf>),
}

/// Maps activation signals to media references for one platform. Argument
/// scanning and native open events never both apply.
#[derive(Debug, Clone, Copy)]
pub struct ActivationPolicy {
    source: FileOpenSource,
}

impl ActivationPolicy {
    pub fn new(source: FileOpenSource) -> Self {
        Self { source }
    }

    pub fn for_current_platform() -> Self {
        Self::new(FileOpenSource::current())
    }

    pub fn source(&self) -> FileOpenSource {
        self.source
    }

    pub fn references(&self, signal: &ActivationSignal) -> Vec<MediaReference> {
        match (self.source, signal) {
            (FileOpenSource::Argv, ActivationSignal::Launch { argv }) => {
                resolve_candidates_in(argv, None).into_iter().collect()
            }
            (FileOpenSource::Argv, ActivationSignal::SecondInstance { argv, cwd }) => {
                resolve_candidates_in(argv, cwd.as_deref()).into_iter().collect()
            }
            (FileOpenSource::NativeEvent, ActivationSignal::OpenedFiles(paths)) => paths
                .iter()
                .filter_map(|p| MediaReference::from_opened_path(p))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Later launch attempts always raise the existing window.
    pub fn requests_focus(&self, signal: &ActivationSignal) -> bool {
        matches!(signal, ActivationSignal::SecondInstance { .. })
    }
}

/// Whether closing the last window ends the process. macOS apps stay
/// resident without windows.
pub fn exits_when_all_windows_closed() -> bool {
    !cfg!(target_os = "macos")
}
