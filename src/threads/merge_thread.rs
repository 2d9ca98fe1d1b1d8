//! Merge worker - serialized submap merging.
//!
//! A single worker drains the intake queue one task at a time, so at most
//! one merge proceeds at any instant and the global map has exactly one
//! writer by construction. For each task:
//!
//! 1. Load the submap and run the submap pipeline commands in order
//!    (stop on first failure; the failure is isolated to this task).
//! 2. Invoke the engine to merge into the current map.
//! 3. Build the successor snapshot (version + 1), run the global-map
//!    pipeline commands against it while it is still unpublished.
//! 4. Publish atomically.
//!
//! A failure at any step drops this task only; the worker logs it and moves
//! on. Once the lifecycle leaves `Running` the worker finishes the in-flight
//! task, discards whatever is still queued, and exits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::config::PipelineConfig;
use crate::core::types::SubmapTask;
use crate::engine::MapEngine;
use crate::intake::TaskReceiver;
use crate::state::{Lifecycle, SnapshotCell};

/// How long the worker sleeps in `recv_timeout` before re-checking the
/// lifecycle.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Merge worker handle.
pub struct MergeThread {
    handle: JoinHandle<()>,
}

impl MergeThread {
    /// Spawn the merge worker.
    pub fn spawn<E: MapEngine>(
        engine: Arc<E>,
        pipeline: Arc<PipelineConfig>,
        snapshot: Arc<SnapshotCell<E::Map>>,
        lifecycle: Arc<Lifecycle>,
        task_rx: TaskReceiver,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("merge".into())
            .spawn(move || {
                let worker = MergeWorker {
                    engine,
                    pipeline,
                    snapshot,
                    lifecycle,
                };
                worker.run(task_rx);
            })
            .expect("Failed to spawn merge thread");

        Self { handle }
    }

    /// Wait for the worker to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

/// Worker-side state for the merge loop.
struct MergeWorker<E: MapEngine> {
    engine: Arc<E>,
    pipeline: Arc<PipelineConfig>,
    snapshot: Arc<SnapshotCell<E::Map>>,
    lifecycle: Arc<Lifecycle>,
}

impl<E: MapEngine> MergeWorker<E> {
    fn run(&self, task_rx: TaskReceiver) {
        log::info!("Merge thread starting");

        let mut discarded = 0usize;
        while self.lifecycle.accepts_work() {
            match task_rx.recv_timeout(IDLE_POLL) {
                Ok(task) => {
                    // Draining may have begun while we waited; a task
                    // received now is queued work, not in-flight work.
                    if self.lifecycle.accepts_work() {
                        self.process_task(task);
                    } else {
                        discarded += 1;
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Intake queue closed, merge thread exiting");
                    break;
                }
            }
        }

        // Draining: the in-flight task (if any) already finished above;
        // everything still queued is discarded.
        discarded += task_rx.try_iter().count();
        if discarded > 0 {
            log::warn!("Discarding {} queued submap tasks on shutdown", discarded);
        }

        log::info!(
            "Merge thread shutdown complete (map version {})",
            self.snapshot.version()
        );
    }

    /// Process one task; failures are logged and isolated to the task.
    fn process_task(&self, task: SubmapTask) {
        log::info!(
            "Processing submap of robot '{}' ({})",
            task.robot_id,
            task.path.display()
        );

        let mut submap = match self.engine.load_submap(&task) {
            Ok(s) => s,
            Err(e) => {
                log::error!(
                    "Merge error: failed to load submap of robot '{}': {}",
                    task.robot_id,
                    e
                );
                return;
            }
        };

        // Submap pipeline, stop on first failure.
        for command in &self.pipeline.submap_commands {
            if let Err(e) = self.engine.apply_submap_command(command, &mut submap) {
                log::error!(
                    "Merge error: submap command '{}' failed for robot '{}': {}",
                    command,
                    task.robot_id,
                    e
                );
                return;
            }
        }

        let current = self.snapshot.load();
        let mut merged = match self.engine.merge_submap(&current.map, submap) {
            Ok(m) => m,
            Err(e) => {
                log::error!(
                    "Merge error: engine rejected submap of robot '{}': {}",
                    task.robot_id,
                    e
                );
                return;
            }
        };

        // Global pipeline runs against the unpublished successor. A failure
        // stops the remaining commands but the merged map is still published:
        // the merge itself succeeded.
        for command in &self.pipeline.global_map_commands {
            if let Err(e) = self.engine.apply_global_command(command, &mut merged) {
                log::error!("Merge error: global map command '{}' failed: {}", command, e);
                break;
            }
        }

        let next = current.next(merged);
        let version = next.version;
        self.snapshot.publish(next);
        log::info!(
            "Merged submap of robot '{}', map version {}",
            task.robot_id,
            version
        );
    }
}
