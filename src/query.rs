//! Batch point-lookup service.
//!
//! Resolves lookup batches against published global-map snapshots,
//! concurrently with merging. Each batch element independently reads the
//! current snapshot: elements never blend two versions, but a merge
//! publishing mid-batch may legitimately make later elements observe a newer
//! version than earlier ones. The batch call itself always succeeds;
//! per-element failures are statuses in the responses.

use std::sync::Arc;

use crate::core::types::{LookupRequest, LookupResponse, LookupStatus};
use crate::engine::MapEngine;
use crate::state::SnapshotCell;

/// Read-side lookup service; cheap to clone and share across callers.
pub struct QueryService<E: MapEngine> {
    engine: Arc<E>,
    snapshot: Arc<SnapshotCell<E::Map>>,
}

impl<E: MapEngine> Clone for QueryService<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

impl<E: MapEngine> QueryService<E> {
    /// Create a service reading `snapshot` through `engine`.
    pub fn new(engine: Arc<E>, snapshot: Arc<SnapshotCell<E::Map>>) -> Self {
        Self { engine, snapshot }
    }

    /// Resolve a batch of lookups.
    ///
    /// Returns exactly one response per request, in request order. One
    /// item's failure status does not affect its siblings.
    pub fn map_lookup(&self, requests: &[LookupRequest]) -> Vec<LookupResponse> {
        requests
            .iter()
            .map(|request| {
                let snapshot = self.snapshot.load();
                let response = self.engine.lookup(&snapshot.map, request);
                if response.status != LookupStatus::Ok {
                    log::debug!(
                        "Lookup for robot '{}' sensor '{}' at {}ns: {:?}",
                        request.robot_name,
                        request.sensor_type,
                        request.timestamp_ns,
                        response.status
                    );
                }
                response
            })
            .collect()
    }

    /// Version of the currently published snapshot.
    pub fn current_version(&self) -> u64 {
        self.snapshot.version()
    }
}
