//! Core data types shared across the server.
//!
//! Value types for submap tasks, point lookups, and intake outcomes.
//! These are plain data; all behavior lives in the layers above.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A 3D point or vector (f64 components).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Create a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector, used as the sentinel for failed lookups.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Component-wise addition.
    pub fn add(&self, other: &Point3) -> Point3 {
        Point3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Rotate around the Z axis by `yaw` radians.
    pub fn rotate_yaw(&self, yaw: f64) -> Point3 {
        let (sin, cos) = yaw.sin_cos();
        Point3::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
            self.z,
        )
    }
}

/// A validated submap notification, queued for merging.
///
/// Created when a notification passes intake validation; destroyed once the
/// merge worker finishes processing it. Never re-enqueued.
#[derive(Debug, Clone)]
pub struct SubmapTask {
    /// Name of the robot that produced the submap.
    pub robot_id: String,
    /// Normalized filesystem path of the submap folder.
    pub path: PathBuf,
    /// Arrival timestamp (microseconds since epoch).
    pub enqueued_at_us: u64,
}

/// Outcome of a submap notification submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Task validated and appended to the intake queue.
    Accepted,
    /// Notification dropped (invalid path or server not accepting).
    Rejected,
}

impl SubmitOutcome {
    /// Whether the notification was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

/// A single point-lookup request.
///
/// Asks for the global-frame position of a point expressed in a sensor
/// frame of one robot at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRequest {
    /// Name of the robot whose trajectory anchors the lookup.
    pub robot_name: String,
    /// Sensor frame identifier (e.g. "lidar").
    pub sensor_type: String,
    /// Query timestamp in nanoseconds.
    pub timestamp_ns: i64,
    /// Point in the sensor frame.
    pub point: Point3,
}

/// Per-item status of a point lookup.
///
/// Always returned as data, never raised as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// Lookup succeeded.
    Ok,
    /// No trajectory recorded for the requested robot.
    RobotUnknown,
    /// Timestamp outside the robot's recorded trajectory.
    TimestampOutOfRange,
    /// Sensor frame identifier not recognized.
    SensorTypeUnknown,
}

impl LookupStatus {
    /// Integer wire code for transport adapters.
    pub fn code(&self) -> i32 {
        match self {
            LookupStatus::Ok => 0,
            LookupStatus::RobotUnknown => 1,
            LookupStatus::TimestampOutOfRange => 2,
            LookupStatus::SensorTypeUnknown => 3,
        }
    }
}

/// Response to a single [`LookupRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResponse {
    /// Lookup status; geometric fields are zeroed unless `Ok`.
    pub status: LookupStatus,
    /// Queried point in the global frame.
    pub point_global: Point3,
    /// Origin of the sensor in the global frame.
    pub sensor_origin_global: Point3,
}

impl LookupResponse {
    /// A failed response with zeroed geometry.
    pub fn failed(status: LookupStatus) -> Self {
        Self {
            status,
            point_global: Point3::zero(),
            sensor_origin_global: Point3::zero(),
        }
    }
}

/// Current time as microseconds since the Unix epoch.
pub fn epoch_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
