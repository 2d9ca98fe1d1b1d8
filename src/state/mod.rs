//! Shared server state.
//!
//! Two pieces are shared between threads:
//! - [`snapshot`]: the versioned global-map snapshot, published copy-on-write
//!   by the merge worker and read by queries and control calls.
//! - [`lifecycle`]: the server lifecycle state machine gating intake and
//!   shutdown.

pub mod lifecycle;
pub mod snapshot;

pub use lifecycle::{Lifecycle, LifecycleState};
pub use snapshot::{GlobalMapState, SnapshotCell, SnapshotHandle};
