//! Versioned global-map snapshots with copy-on-write publication.
//!
//! The merge worker is the only writer: it builds a complete new
//! [`GlobalMapState`] off to the side and publishes it with a single pointer
//! swap. Readers clone the current `Arc` and keep a fully-formed snapshot for
//! as long as they need it; a snapshot is never mutated after publication.

use std::sync::Arc;

use parking_lot::RwLock;

/// One immutable version of the merged global map.
///
/// `version` increases by exactly one per successful merge and never
/// decreases. Version 0 is the empty initial map.
#[derive(Debug)]
pub struct GlobalMapState<M> {
    /// Monotonically increasing version counter.
    pub version: u64,
    /// Opaque map data owned by the mapping engine.
    pub map: Arc<M>,
}

impl<M> GlobalMapState<M> {
    /// The initial (version 0) state wrapping an empty map.
    pub fn initial(map: M) -> Self {
        Self {
            version: 0,
            map: Arc::new(map),
        }
    }

    /// The successor state wrapping a newly merged map.
    pub fn next(&self, map: M) -> Self {
        Self {
            version: self.version + 1,
            map: Arc::new(map),
        }
    }
}

/// Handle to a published snapshot.
pub type SnapshotHandle<M> = Arc<GlobalMapState<M>>;

/// Single-writer / multi-reader cell holding the current snapshot.
#[derive(Debug)]
pub struct SnapshotCell<M> {
    current: RwLock<SnapshotHandle<M>>,
}

impl<M> SnapshotCell<M> {
    /// Create a cell holding the version-0 state for `map`.
    pub fn new(map: M) -> Self {
        Self {
            current: RwLock::new(Arc::new(GlobalMapState::initial(map))),
        }
    }

    /// Load the current snapshot.
    ///
    /// Cheap: clones the `Arc` under a momentary read lock.
    pub fn load(&self) -> SnapshotHandle<M> {
        self.current.read().clone()
    }

    /// Current version without retaining the snapshot.
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Publish a fully-formed successor state.
    ///
    /// Called only by the merge worker. All subsequent [`Self::load`] calls
    /// observe the new state in full.
    pub fn publish(&self, state: GlobalMapState<M>) {
        *self.current.write() = Arc::new(state);
    }
}
