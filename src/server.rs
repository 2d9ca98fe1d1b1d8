//! Map server facade.
//!
//! Owns the composition: configuration, engine, snapshot cell, intake
//! queue, lifecycle, and the merge worker. Exposes the control surface
//! (start, save, visualize, shutdown), the notification seam for transport
//! adapters, and the read-side query service.
//!
//! Transport adapters hold an `Arc<dyn SubmapNotifier>` (or the concrete
//! `Arc<MapServer<E>>`) and nothing else; the server never references its
//! adapters back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{PipelineConfig, ServerConfig};
use crate::core::types::{LookupRequest, LookupResponse, SubmitOutcome};
use crate::engine::MapEngine;
use crate::intake::{IntakeQueue, TaskReceiver};
use crate::query::QueryService;
use crate::state::{Lifecycle, LifecycleState, SnapshotCell};
use crate::threads::MergeThread;

/// Capability interface for submap notifications.
///
/// Implemented by [`MapServer`]; transport adapters (out of scope here)
/// call it when a notification arrives on the wire.
pub trait SubmapNotifier: Send + Sync {
    /// A robot announced a finished submap at `path`.
    fn on_submap_available(&self, robot_id: &str, path: &Path) -> SubmitOutcome;
}

/// The centralized map-aggregation server.
pub struct MapServer<E: MapEngine> {
    config: ServerConfig,
    engine: Arc<E>,
    snapshot: Arc<SnapshotCell<E::Map>>,
    intake: IntakeQueue,
    lifecycle: Arc<Lifecycle>,
    pipeline: Arc<PipelineConfig>,
    /// Receiver parked between construction and `start`.
    task_rx: Mutex<Option<TaskReceiver>>,
    /// Worker handle, taken by the first `shutdown`.
    merge_thread: Mutex<Option<MergeThread>>,
}

impl<E: MapEngine> MapServer<E> {
    /// Create a server in the `Created` state.
    ///
    /// All configuration is taken here, immutably; nothing is global.
    pub fn new(config: ServerConfig, pipeline: PipelineConfig, engine: E) -> Self {
        let engine = Arc::new(engine);
        let snapshot = Arc::new(SnapshotCell::new(engine.empty_map()));
        let lifecycle = Arc::new(Lifecycle::new());
        let (intake, task_rx) = IntakeQueue::new(Arc::clone(&lifecycle));

        log::info!(
            "Map server created ({} submap commands, {} global map commands)",
            pipeline.submap_commands.len(),
            pipeline.global_map_commands.len()
        );

        Self {
            config,
            engine,
            snapshot,
            intake,
            lifecycle,
            pipeline: Arc::new(pipeline),
            task_rx: Mutex::new(Some(task_rx)),
            merge_thread: Mutex::new(None),
        }
    }

    /// Start the merge worker: `Created → Running`.
    ///
    /// Returns false (and does nothing) if the server already left `Created`.
    pub fn start(&self) -> bool {
        if !self.lifecycle.start() {
            log::warn!("start() ignored: server is {:?}", self.lifecycle.state());
            return false;
        }

        let task_rx = self
            .task_rx
            .lock()
            .take()
            .expect("task receiver consumed before start");

        let thread = MergeThread::spawn(
            Arc::clone(&self.engine),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.snapshot),
            Arc::clone(&self.lifecycle),
            task_rx,
        );
        *self.merge_thread.lock() = Some(thread);

        log::info!("Map server started");
        true
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Version of the currently published global map.
    pub fn map_version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Submit a submap notification (see [`IntakeQueue::submit`]).
    pub fn submit_submap(&self, robot_id: &str, path: &Path) -> SubmitOutcome {
        self.intake.submit(robot_id, path)
    }

    /// Read-side query service, shareable across lookup callers.
    pub fn query_service(&self) -> QueryService<E> {
        QueryService::new(Arc::clone(&self.engine), Arc::clone(&self.snapshot))
    }

    /// Resolve a batch of point lookups against the current snapshot.
    pub fn map_lookup(&self, requests: &[LookupRequest]) -> Vec<LookupResponse> {
        self.query_service().map_lookup(requests)
    }

    /// Write the current snapshot to `folder`, or to the configured
    /// merged-map folder when omitted. Safe concurrently with merging.
    pub fn save_map(&self, folder: Option<&Path>) -> bool {
        let target: PathBuf = folder
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.merged_map_folder.clone());

        let snapshot = self.snapshot.load();
        log::info!(
            "Saving map version {} to '{}'",
            snapshot.version,
            target.display()
        );

        match self.engine.save_map(&snapshot.map, &target) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save map to '{}': {}", target.display(), e);
                false
            }
        }
    }

    /// Trigger external visualization of the current snapshot.
    pub fn visualize_map(&self) {
        let snapshot = self.snapshot.load();
        log::info!("Visualizing map version {}", snapshot.version);
        self.engine.visualize_map(&snapshot.map);
    }

    /// Shut the server down: `Running → Draining → Stopped`.
    ///
    /// Stops intake immediately, lets the in-flight merge finish (the engine
    /// call is not cancellable), discards the remaining queue, joins the
    /// worker. Idempotent; always succeeds.
    pub fn shutdown(&self) {
        if self.lifecycle.state() == LifecycleState::Stopped {
            log::info!("shutdown() ignored: server already stopped");
            return;
        }

        log::info!("Shutting down: draining merge worker...");
        self.lifecycle.begin_draining();

        if let Some(thread) = self.merge_thread.lock().take()
            && let Err(e) = thread.join()
        {
            log::error!("Merge thread panicked: {:?}", e);
        }

        self.lifecycle.stop();
        log::info!(
            "Map server stopped (final map version {})",
            self.snapshot.version()
        );
    }

    /// Server configuration (immutable after construction).
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl<E: MapEngine> SubmapNotifier for MapServer<E> {
    fn on_submap_available(&self, robot_id: &str, path: &Path) -> SubmitOutcome {
        self.submit_submap(robot_id, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TrajectoryMapEngine;

    fn test_server() -> MapServer<TrajectoryMapEngine> {
        let pipeline = PipelineConfig {
            submap_commands: vec![],
            global_map_commands: vec![],
        };
        MapServer::new(
            ServerConfig::default(),
            pipeline,
            TrajectoryMapEngine::new("/tmp/resources"),
        )
    }

    #[test]
    fn test_lifecycle_progression() {
        let server = test_server();
        assert_eq!(server.state(), LifecycleState::Created);

        assert!(server.start());
        assert_eq!(server.state(), LifecycleState::Running);
        assert!(!server.start());

        server.shutdown();
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let server = test_server();
        server.start();

        server.shutdown();
        server.shutdown();
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_shutdown_without_start() {
        let server = test_server();
        server.shutdown();
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server();
        server.start();
        server.shutdown();

        assert_eq!(
            server.submit_submap("robot_a", dir.path()),
            SubmitOutcome::Rejected
        );
    }

    #[test]
    fn test_notifier_seam_delegates() {
        let dir = tempfile::tempdir().unwrap();
        let server: Arc<dyn SubmapNotifier> = Arc::new(test_server());

        // Created state accepts; the task waits for start.
        assert!(
            server
                .on_submap_available("robot_a", dir.path())
                .is_accepted()
        );
    }

    #[test]
    fn test_save_map_to_explicit_folder() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server();

        let out = dir.path().join("merged");
        assert!(server.save_map(Some(&out)));
        assert!(out.exists());
    }
}
