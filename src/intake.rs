//! Submap notification intake.
//!
//! Multi-producer FIFO between transport adapters and the merge worker.
//! `submit` validates the notification, never blocks, and returns
//! immediately; the queue is unbounded (backpressure, if any, belongs to
//! the transport layer). Accepted tasks keep their arrival order across
//! concurrent producers: the channel serializes enqueues, so ties on the
//! same instant are broken by enqueue order.

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::types::{SubmapTask, SubmitOutcome, epoch_micros};
use crate::state::Lifecycle;

/// Receiver end of the intake queue (held by the merge worker).
pub type TaskReceiver = Receiver<SubmapTask>;

/// Multi-producer intake queue for submap notifications.
#[derive(Debug, Clone)]
pub struct IntakeQueue {
    task_tx: Sender<SubmapTask>,
    lifecycle: Arc<Lifecycle>,
}

impl IntakeQueue {
    /// Create a queue gated by `lifecycle`; returns the producer handle and
    /// the worker-side receiver.
    pub fn new(lifecycle: Arc<Lifecycle>) -> (Self, TaskReceiver) {
        let (task_tx, task_rx) = unbounded();
        (Self { task_tx, lifecycle }, task_rx)
    }

    /// Submit a submap notification.
    ///
    /// The path must exist; it is normalized (relative segments resolved)
    /// before the task is enqueued. A nonexistent path or a server that is
    /// draining or stopped yields `Rejected`; the notification is dropped
    /// and logged, never retried.
    pub fn submit(&self, robot_id: &str, path: &Path) -> SubmitOutcome {
        if !self.lifecycle.accepts_notifications() {
            log::warn!(
                "Rejected submap notification for robot '{}' ({}): server is {:?}",
                robot_id,
                path.display(),
                self.lifecycle.state()
            );
            return SubmitOutcome::Rejected;
        }

        // Existence check and normalization in one step.
        let normalized = match path.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                log::error!(
                    "Received submap notification for robot '{}' and folder '{}', \
                     but the folder does not exist: {}",
                    robot_id,
                    path.display(),
                    e
                );
                return SubmitOutcome::Rejected;
            }
        };

        let task = SubmapTask {
            robot_id: robot_id.to_string(),
            path: normalized,
            enqueued_at_us: epoch_micros(),
        };

        // Unbounded channel: send only fails when the worker side is gone,
        // which happens during teardown; treat it like draining.
        match self.task_tx.send(task) {
            Ok(()) => {
                log::debug!("Queued submap of robot '{}' ({})", robot_id, path.display());
                SubmitOutcome::Accepted
            }
            Err(_) => {
                log::warn!(
                    "Dropped submap notification for robot '{}': queue closed",
                    robot_id
                );
                SubmitOutcome::Rejected
            }
        }
    }

    /// Number of tasks currently queued.
    pub fn len(&self) -> usize {
        self.task_tx.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.task_tx.is_empty()
    }
}
