//! Sangraha - centralized map-aggregation server for multi-robot mapping.
//!
//! Independent robots build partial maps ("submaps") and notify the server
//! asynchronously; the server merges each submap into one evolving global
//! map while concurrently answering point-lookup and map-management calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     server                          │  ← Facade + control
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌──────────────────────┐  ┌─────────────────────────────┐
//! │       threads         │  │           query             │  ← Worker / reads
//! │    (merge worker)     │  │      (batch lookups)        │
//! └──────────────────────┘  └─────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │               intake · state · engine               │  ← Queue, snapshots,
//! │                                                     │    engine seam
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                config · error · core                │  ← Foundation
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Flow: notification → [`intake::IntakeQueue`] → merge worker →
//! new [`state::GlobalMapState`] version published → visible to
//! [`query::QueryService`] and control calls.
//!
//! Concurrency model: many producers and lookup callers, exactly one merge
//! worker. The worker is the only writer of the global map; publication is
//! copy-on-write, so readers never observe a partially merged state and are
//! never blocked by a merge in progress.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod intake;
pub mod query;
pub mod server;
pub mod state;
pub mod threads;

pub use crate::config::{Config, PipelineConfig, ServerConfig};
pub use crate::core::types::{
    LookupRequest, LookupResponse, LookupStatus, Point3, SubmapTask, SubmitOutcome,
};
pub use crate::engine::{MapEngine, TrajectoryMapEngine};
pub use crate::error::{Error, Result};
pub use crate::query::QueryService;
pub use crate::server::{MapServer, SubmapNotifier};
pub use crate::state::{GlobalMapState, Lifecycle, LifecycleState, SnapshotCell};
