//! Mapping-engine seam.
//!
//! The server coordinates merging but never touches map geometry itself:
//! everything map-shaped goes through the [`MapEngine`] trait. The engine
//! owns the map representation, the submap format, the merged-map folder
//! layout, and the resolution of pipeline command identifiers.
//!
//! [`trajectory::TrajectoryMapEngine`] is the bundled reference
//! implementation; deployments with a full mapping stack implement the trait
//! themselves.

pub mod trajectory;

use std::path::Path;

use crate::core::types::{LookupRequest, LookupResponse, SubmapTask};
use crate::error::Result;

pub use trajectory::TrajectoryMapEngine;

/// The mapping engine invoked by the merge worker and read-side services.
///
/// `Map` is the engine's opaque merged-map type; the server only ever holds
/// it behind `Arc` inside published snapshots. `Submap` is the staged form of
/// one loaded submap between load and merge.
///
/// Merging is copy-on-write: `merge_submap` receives the current map by
/// shared reference and returns a complete successor. `apply_global_command`
/// runs before publication, while the successor is still exclusively owned
/// by the worker, and may therefore mutate it.
pub trait MapEngine: Send + Sync + 'static {
    /// Opaque merged-map type.
    type Map: Send + Sync + 'static;
    /// Staged submap between load and merge.
    type Submap: Send;

    /// Produce the empty map for the version-0 snapshot.
    fn empty_map(&self) -> Self::Map;

    /// Load the submap referenced by a task from disk.
    fn load_submap(&self, task: &SubmapTask) -> Result<Self::Submap>;

    /// Execute one pre-merge command against a staged submap.
    ///
    /// Unknown identifiers fail here; they are not validated at config load.
    fn apply_submap_command(&self, command: &str, submap: &mut Self::Submap) -> Result<()>;

    /// Merge a staged submap into the current map, returning the successor.
    fn merge_submap(&self, current: &Self::Map, submap: Self::Submap) -> Result<Self::Map>;

    /// Execute one post-merge command against the not-yet-published map.
    fn apply_global_command(&self, command: &str, map: &mut Self::Map) -> Result<()>;

    /// Resolve one point lookup against a published map.
    ///
    /// Failures are statuses in the response, never errors.
    fn lookup(&self, map: &Self::Map, request: &LookupRequest) -> LookupResponse;

    /// Write the map to `folder`; the folder's internal structure is
    /// owned by the engine.
    fn save_map(&self, map: &Self::Map, folder: &Path) -> Result<()>;

    /// Hand the map to external visualization.
    fn visualize_map(&self, map: &Self::Map);
}
