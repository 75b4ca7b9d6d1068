//! Extension lifecycle controller
//!
//! Loads and unloads the bundle into the partition through an
//! [`ExtensionHost`]. Transitions are serialized: a caller that arrives while
//! an operation in the same direction is in flight joins that operation and
//! gets its outcome; a caller asking for the opposite direction waits for it
//! to settle first. Every started operation runs to completion on the runtime,
//! whether or not anyone is still waiting for it.

pub mod bundle;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::HostResult;
use crate::session::{Partition, PartitionRef};

pub use bundle::{
    clear_staging, derive_extension_id, BundleManifest, ExtensionId, UnpackedBundle,
};

const LOAD_ERROR_TITLE: &str = "HaramBlur load error";
const UNLOAD_ERROR_TITLE: &str = "HaramBlur unload error";

/// What the host reports about a successfully loaded extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedExtension {
    pub id: ExtensionId,
    pub name: String,
    pub version: String,
}

/// Platform primitive that installs a bundle into a partition
#[async_trait]
pub trait ExtensionHost: Send + Sync {
    async fn load(&self, partition: &Partition, bundle: &Path) -> HostResult<LoadedExtension>;
    async fn unload(&self, partition: &Partition, id: &ExtensionId) -> HostResult<()>;
}

/// Blocking notice shown to the user for recoverable failures
pub trait Notifier: Send + Sync {
    fn show_error(&self, title: &str, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecyclePhase {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Load,
    Unload,
}

/// Resolves to whether the extension is loaded once the operation settles.
type Outcome = Shared<BoxFuture<'static, bool>>;

struct InFlight {
    direction: Direction,
    outcome: Outcome,
}

struct Lifecycle {
    phase: LifecyclePhase,
    loaded: Option<LoadedExtension>,
    in_flight: Option<InFlight>,
}

impl Lifecycle {
    fn settle(&mut self, loaded: Option<LoadedExtension>) -> bool {
        self.phase = if loaded.is_some() {
            LifecyclePhase::Loaded
        } else {
            LifecyclePhase::Unloaded
        };
        self.loaded = loaded;
        self.in_flight = None;
        self.loaded.is_some()
    }
}

enum Step {
    Done(bool),
    Join(Outcome),
    WaitThenRetry(Outcome),
}

pub struct ExtensionController {
    partition: PartitionRef,
    bundle_path: PathBuf,
    host: Arc<dyn ExtensionHost>,
    notifier: Arc<dyn Notifier>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl ExtensionController {
    pub fn new(
        partition: PartitionRef,
        bundle_path: PathBuf,
        host: Arc<dyn ExtensionHost>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            partition,
            bundle_path,
            host,
            notifier,
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                phase: LifecyclePhase::Unloaded,
                loaded: None,
                in_flight: None,
            })),
        }
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    pub fn partition(&self) -> &PartitionRef {
        &self.partition
    }

    /// Whether an id is currently recorded.
    pub fn status(&self) -> bool {
        self.lifecycle.lock().loaded.is_some()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.lifecycle.lock().phase
    }

    pub fn extension_id(&self) -> Option<ExtensionId> {
        self.lifecycle.lock().loaded.as_ref().map(|ext| ext.id.clone())
    }

    pub fn loaded(&self) -> Option<LoadedExtension> {
        self.lifecycle.lock().loaded.clone()
    }

    /// Loads the bundle unless it is loaded or loading. Returns whether the
    /// extension is loaded afterwards; failures are reported to the user and
    /// yield `false`.
    pub async fn enable(&self) -> bool {
        self.drive(Direction::Load).await
    }

    /// Removes the extension unless it is unloaded or unloading. Returns
    /// whether the extension is still loaded afterwards (always `false`).
    pub async fn disable(&self) -> bool {
        self.drive(Direction::Unload).await
    }

    /// Unload followed by load. No rollback: the result is whatever the last
    /// completed step produced.
    pub async fn reload(&self) -> bool {
        info!("Reloading extension from {:?}", self.bundle_path);
        self.disable().await;
        self.enable().await
    }

    async fn drive(&self, direction: Direction) -> bool {
        loop {
            let step = {
                let mut lifecycle = self.lifecycle.lock();
                let in_flight = lifecycle
                    .in_flight
                    .as_ref()
                    .map(|op| (op.direction, op.outcome.clone()));
                match in_flight {
                    Some((running, outcome)) if running == direction => Step::Join(outcome),
                    Some((_, outcome)) => Step::WaitThenRetry(outcome),
                    None => {
                        let loaded = lifecycle.loaded.is_some();
                        if loaded == (direction == Direction::Load) {
                            Step::Done(loaded)
                        } else {
                            Step::Join(self.start(&mut lifecycle, direction))
                        }
                    }
                }
            };

            match step {
                Step::Done(loaded) => return loaded,
                Step::Join(outcome) => return outcome.await,
                Step::WaitThenRetry(outcome) => {
                    outcome.await;
                }
            }
        }
    }

    /// Spawns the transition. Must be called with the lifecycle lock held so
    /// the in-flight record is visible before anyone else looks.
    fn start(&self, lifecycle: &mut Lifecycle, direction: Direction) -> Outcome {
        lifecycle.phase = match direction {
            Direction::Load => LifecyclePhase::Loading,
            Direction::Unload => LifecyclePhase::Unloading,
        };

        let host = Arc::clone(&self.host);
        let notifier = Arc::clone(&self.notifier);
        let partition = Arc::clone(&self.partition);
        let bundle_path = self.bundle_path.clone();
        let current = lifecycle.loaded.clone();
        let state = Arc::clone(&self.lifecycle);

        let task = tokio::spawn(async move {
            let loaded = match direction {
                Direction::Load => match host.load(&partition, &bundle_path).await {
                    Ok(ext) => {
                        info!(
                            "Loaded extension {} {} into {} (id {})",
                            ext.name,
                            ext.version,
                            partition.name(),
                            ext.id
                        );
                        Some(ext)
                    }
                    Err(e) => {
                        error!("Failed to load extension: {}", e);
                        notifier.show_error(LOAD_ERROR_TITLE, &e.to_string());
                        None
                    }
                },
                Direction::Unload => {
                    if let Some(ext) = current {
                        match host.unload(&partition, &ext.id).await {
                            Ok(()) => info!("Removed extension {}", ext.id),
                            Err(e) => {
                                warn!("Failed to remove extension {}: {}", ext.id, e);
                                notifier.show_error(UNLOAD_ERROR_TITLE, &e.to_string());
                            }
                        }
                    }
                    None
                }
            };
            state.lock().settle(loaded)
        });

        let state = Arc::clone(&self.lifecycle);
        let outcome = async move {
            match task.await {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!("Extension transition aborted: {}", e);
                    let mut lifecycle = state.lock();
                    let loaded = lifecycle.loaded.take();
                    lifecycle.settle(loaded)
                }
            }
        }
        .boxed()
        .shared();

        lifecycle.in_flight = Some(InFlight {
            direction,
            outcome: outcome.clone(),
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::session::SessionManager;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeHost {
        loads: AtomicUsize,
        unloads: AtomicUsize,
        fail_load: AtomicUsize,
        fail_unload: AtomicUsize,
        delay_ms: u64,
    }

    #[async_trait]
    impl ExtensionHost for FakeHost {
        async fn load(&self, _partition: &Partition, bundle: &Path) -> HostResult<LoadedExtension> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_load.load(Ordering::SeqCst) > 0 {
                self.fail_load.fetch_sub(1, Ordering::SeqCst);
                return Err(HostError::ExtensionLoad {
                    path: bundle.to_path_buf(),
                    reason: "manifest missing".into(),
                });
            }
            Ok(LoadedExtension {
                id: ExtensionId::new(format!("ext-{n}")),
                name: "HaramBlur".into(),
                version: "1.0.0".into(),
            })
        }

        async fn unload(&self, _partition: &Partition, id: &ExtensionId) -> HostResult<()> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail_unload.load(Ordering::SeqCst) > 0 {
                return Err(HostError::ExtensionUnload {
                    id: id.to_string(),
                    reason: "busy".into(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_error(&self, title: &str, message: &str) {
            self.shown.lock().push((title.to_string(), message.to_string()));
        }
    }

    struct Fixture {
        _root: TempDir,
        host: Arc<FakeHost>,
        notifier: Arc<RecordingNotifier>,
        controller: Arc<ExtensionController>,
    }

    fn fixture(host: FakeHost) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let partition = SessionManager::new(root.path())
            .create_partition("persist:haramblur")
            .unwrap();
        let host = Arc::new(host);
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = Arc::new(ExtensionController::new(
            partition,
            PathBuf::from("/opt/HaramBlur"),
            host.clone(),
            notifier.clone(),
        ));
        Fixture {
            _root: root,
            host,
            notifier,
            controller,
        }
    }

    #[tokio::test]
    async fn test_enable_twice_loads_once() {
        let f = fixture(FakeHost::default());

        assert!(f.controller.enable().await);
        assert!(f.controller.enable().await);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.phase(), LifecyclePhase::Loaded);
        assert_eq!(f.controller.extension_id(), Some(ExtensionId::new("ext-1")));
    }

    #[tokio::test]
    async fn test_disable_when_unloaded_is_a_no_op() {
        let f = fixture(FakeHost::default());

        assert!(!f.controller.disable().await);
        assert_eq!(f.host.unloads.load(Ordering::SeqCst), 0);
        assert_eq!(f.controller.phase(), LifecyclePhase::Unloaded);
    }

    #[tokio::test]
    async fn test_disable_clears_the_id() {
        let f = fixture(FakeHost::default());

        f.controller.enable().await;
        assert!(!f.controller.disable().await);
        assert!(!f.controller.status());
        assert_eq!(f.controller.extension_id(), None);
        assert_eq!(f.host.unloads.load(Ordering::SeqCst), 1);

        assert!(!f.controller.disable().await);
        assert_eq!(f.host.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_reported_and_left_unloaded() {
        let host = FakeHost::default();
        host.fail_load.store(1, Ordering::SeqCst);
        let f = fixture(host);

        assert!(!f.controller.enable().await);
        assert_eq!(f.controller.phase(), LifecyclePhase::Unloaded);

        let shown = f.notifier.shown.lock().clone();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, LOAD_ERROR_TITLE);
        assert!(shown[0].1.contains("manifest missing"));

        // a later attempt starts from scratch
        assert!(f.controller.enable().await);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_unload_still_ends_unloaded() {
        let host = FakeHost::default();
        host.fail_unload.store(1, Ordering::SeqCst);
        let f = fixture(host);

        f.controller.enable().await;
        assert!(!f.controller.disable().await);
        assert_eq!(f.controller.phase(), LifecyclePhase::Unloaded);
        assert_eq!(f.notifier.shown.lock()[0].0, UNLOAD_ERROR_TITLE);
    }

    #[tokio::test]
    async fn test_reload_reassigns_the_id() {
        let f = fixture(FakeHost::default());

        f.controller.enable().await;
        let before = f.controller.extension_id().unwrap();

        assert!(f.controller.reload().await);
        let after = f.controller.extension_id().unwrap();
        assert_ne!(before, after);
        assert!(f.controller.status());
        assert_eq!(f.host.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reload_with_failing_load_stays_unloaded() {
        let f = fixture(FakeHost::default());
        f.controller.enable().await;

        f.host.fail_load.store(1, Ordering::SeqCst);
        assert!(!f.controller.reload().await);
        assert_eq!(f.controller.phase(), LifecyclePhase::Unloaded);
        assert_eq!(f.controller.extension_id(), None);
    }

    #[tokio::test]
    async fn test_overlapping_enables_collapse_to_one_load() {
        let f = fixture(FakeHost {
            delay_ms: 20,
            ..FakeHost::default()
        });

        let (a, b, c) = tokio::join!(
            f.controller.enable(),
            f.controller.enable(),
            f.controller.enable()
        );
        assert!(a && b && c);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overlapping_failed_enables_report_once() {
        let host = FakeHost {
            delay_ms: 20,
            ..FakeHost::default()
        };
        host.fail_load.store(1, Ordering::SeqCst);
        let f = fixture(host);

        let (a, b) = tokio::join!(f.controller.enable(), f.controller.enable());
        assert!(!a && !b);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 1);
        assert_eq!(f.notifier.shown.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_opposite_request_waits_for_in_flight_load() {
        let f = fixture(FakeHost {
            delay_ms: 20,
            ..FakeHost::default()
        });

        let (enabled, disabled) = tokio::join!(f.controller.enable(), f.controller.disable());
        assert!(enabled);
        assert!(!disabled);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(f.controller.phase(), LifecyclePhase::Unloaded);
    }

    #[tokio::test]
    async fn test_in_flight_load_completes_without_waiters() {
        let f = fixture(FakeHost {
            delay_ms: 10,
            ..FakeHost::default()
        });

        let controller = f.controller.clone();
        let waiter = tokio::spawn(async move { controller.enable().await });
        tokio::time::sleep(Duration::from_millis(2)).await;
        waiter.abort();
        let _ = waiter.await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(f.controller.phase(), LifecyclePhase::Loaded);
        assert!(f.controller.enable().await);
        assert_eq!(f.host.loads.load(Ordering::SeqCst), 1);
    }
}
