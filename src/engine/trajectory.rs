//! Reference mapping engine backed by per-robot trajectory tracks.
//!
//! Keeps one timestamped pose track per robot. Merging a submap appends its
//! poses to the robot's track; lookups interpolate the track at the query
//! timestamp and transform the sensor-frame point into the global frame
//! through a fixed per-sensor extrinsic offset.
//!
//! ## Submap format
//!
//! A submap is a folder containing `submap.toml`:
//!
//! ```toml
//! robot = "robot_a"        # optional, informational
//! [[poses]]
//! timestamp_ns = 1000
//! x = 0.0
//! y = 0.0
//! z = 0.0
//! yaw = 0.0
//! ```
//!
//! ## Merged-map output
//!
//! `save_map` writes `merged_map.toml` (full tracks) and `map_info.toml`
//! (summary metadata) into the target folder. Both files are owned by this
//! engine; the server treats the folder as opaque.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::math::{angle_lerp, lerp};
use crate::core::types::{
    LookupRequest, LookupResponse, LookupStatus, Point3, SubmapTask, epoch_micros,
};
use crate::engine::MapEngine;
use crate::error::{Error, Result};

/// One timestamped pose sample: planar position with height and heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    /// Sample timestamp in nanoseconds.
    pub timestamp_ns: i64,
    /// Position X in the global frame (meters).
    pub x: f64,
    /// Position Y in the global frame (meters).
    pub y: f64,
    /// Position Z in the global frame (meters).
    pub z: f64,
    /// Heading around Z (radians).
    pub yaw: f64,
}

impl StampedPose {
    fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }

    /// Interpolate between two samples at timestamp `t`.
    fn interpolate(a: &StampedPose, b: &StampedPose, t: i64) -> StampedPose {
        if b.timestamp_ns == a.timestamp_ns {
            return *a;
        }
        let f = (t - a.timestamp_ns) as f64 / (b.timestamp_ns - a.timestamp_ns) as f64;
        StampedPose {
            timestamp_ns: t,
            x: lerp(a.x, b.x, f),
            y: lerp(a.y, b.y, f),
            z: lerp(a.z, b.z, f),
            yaw: angle_lerp(a.yaw, b.yaw, f),
        }
    }
}

/// One robot's pose track, sorted by timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotTrack {
    /// Pose samples in ascending timestamp order.
    pub poses: Vec<StampedPose>,
}

impl RobotTrack {
    /// Interpolated pose at `timestamp_ns`, or None if outside the track.
    fn pose_at(&self, timestamp_ns: i64) -> Option<StampedPose> {
        let first = self.poses.first()?;
        let last = self.poses.last()?;
        if timestamp_ns < first.timestamp_ns || timestamp_ns > last.timestamp_ns {
            return None;
        }

        let idx = self
            .poses
            .partition_point(|p| p.timestamp_ns < timestamp_ns);
        if idx == 0 {
            return Some(*first);
        }
        Some(StampedPose::interpolate(
            &self.poses[idx - 1],
            &self.poses[idx],
            timestamp_ns,
        ))
    }
}

/// The merged map: every robot's track plus merge bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrajectoryMap {
    /// Tracks keyed by robot name.
    pub robots: BTreeMap<String, RobotTrack>,
    /// Number of submaps merged into this map.
    pub merge_count: u64,
}

impl TrajectoryMap {
    /// Total pose samples across all robots.
    pub fn pose_count(&self) -> usize {
        self.robots.values().map(|t| t.poses.len()).sum()
    }
}

/// A staged submap between load and merge.
#[derive(Debug, Clone)]
pub struct TrajectorySubmap {
    /// Robot the submap belongs to.
    pub robot_id: String,
    /// Pose samples carried by the submap.
    pub poses: Vec<StampedPose>,
}

/// On-disk form of `submap.toml`.
#[derive(Debug, Deserialize)]
struct SubmapFile {
    #[allow(dead_code)]
    robot: Option<String>,
    poses: Vec<StampedPose>,
}

/// Summary metadata written next to the merged map.
#[derive(Debug, Serialize, Deserialize)]
struct MapInfo {
    robot_count: usize,
    pose_count: usize,
    merge_count: u64,
    saved_at_us: u64,
    resource_folder: PathBuf,
}

/// Name of the submap file inside a submap folder.
const SUBMAP_FILE: &str = "submap.toml";
/// Name of the merged-map file inside the output folder.
const MERGED_MAP_FILE: &str = "merged_map.toml";
/// Name of the metadata file inside the output folder.
const MAP_INFO_FILE: &str = "map_info.toml";

/// Reference engine over per-robot trajectory tracks.
pub struct TrajectoryMapEngine {
    /// Sensor-frame extrinsics: offset of each known sensor in the body frame.
    extrinsics: BTreeMap<String, Point3>,
    /// Recorded in saved map metadata.
    resource_folder: PathBuf,
}

impl TrajectoryMapEngine {
    /// Create an engine with the default sensor set (lidar, camera, imu).
    pub fn new<P: Into<PathBuf>>(resource_folder: P) -> Self {
        let mut extrinsics = BTreeMap::new();
        extrinsics.insert("lidar".to_string(), Point3::new(0.0, 0.0, 0.10));
        extrinsics.insert("camera".to_string(), Point3::new(0.05, 0.0, 0.05));
        extrinsics.insert("imu".to_string(), Point3::zero());
        Self {
            extrinsics,
            resource_folder: resource_folder.into(),
        }
    }

    /// Replace the sensor extrinsics table.
    pub fn with_extrinsics(mut self, extrinsics: BTreeMap<String, Point3>) -> Self {
        self.extrinsics = extrinsics;
        self
    }
}

impl MapEngine for TrajectoryMapEngine {
    type Map = TrajectoryMap;
    type Submap = TrajectorySubmap;

    fn empty_map(&self) -> TrajectoryMap {
        TrajectoryMap::default()
    }

    fn load_submap(&self, task: &SubmapTask) -> Result<TrajectorySubmap> {
        let file_path = task.path.join(SUBMAP_FILE);
        let contents = fs::read_to_string(&file_path).map_err(|e| {
            Error::InvalidSubmap(format!("cannot read {}: {}", file_path.display(), e))
        })?;
        let file: SubmapFile = toml::from_str(&contents)
            .map_err(|e| Error::InvalidSubmap(format!("{}: {}", file_path.display(), e)))?;

        if file.poses.is_empty() {
            return Err(Error::InvalidSubmap(format!(
                "{}: submap carries no poses",
                file_path.display()
            )));
        }

        Ok(TrajectorySubmap {
            robot_id: task.robot_id.clone(),
            poses: file.poses,
        })
    }

    fn apply_submap_command(&self, command: &str, submap: &mut TrajectorySubmap) -> Result<()> {
        match command {
            // Poses may arrive unsorted from robots with reordered uploads.
            "sort_poses" => {
                submap.poses.sort_by_key(|p| p.timestamp_ns);
                Ok(())
            }
            "deduplicate_poses" => {
                let before = submap.poses.len();
                submap.poses.dedup_by_key(|p| p.timestamp_ns);
                log::debug!(
                    "deduplicate_poses: {} -> {} poses for '{}'",
                    before,
                    submap.poses.len(),
                    submap.robot_id
                );
                Ok(())
            }
            "validate_timestamps" => {
                let sorted = submap.poses.windows(2).all(|w| {
                    w[0].timestamp_ns <= w[1].timestamp_ns
                });
                if sorted {
                    Ok(())
                } else {
                    Err(Error::CommandFailed {
                        command: command.to_string(),
                        message: format!(
                            "submap of '{}' has out-of-order timestamps",
                            submap.robot_id
                        ),
                    })
                }
            }
            _ => Err(Error::UnknownCommand(command.to_string())),
        }
    }

    fn merge_submap(
        &self,
        current: &TrajectoryMap,
        submap: TrajectorySubmap,
    ) -> Result<TrajectoryMap> {
        let mut next = current.clone();
        let track = next.robots.entry(submap.robot_id).or_default();
        track.poses.extend(submap.poses);
        track.poses.sort_by_key(|p| p.timestamp_ns);
        next.merge_count += 1;
        Ok(next)
    }

    fn apply_global_command(&self, command: &str, map: &mut TrajectoryMap) -> Result<()> {
        match command {
            "summarize" => {
                log::info!(
                    "Merged map: {} robots, {} poses, {} merges",
                    map.robots.len(),
                    map.pose_count(),
                    map.merge_count
                );
                Ok(())
            }
            "prune_empty_tracks" => {
                map.robots.retain(|_, track| !track.poses.is_empty());
                Ok(())
            }
            _ => Err(Error::UnknownCommand(command.to_string())),
        }
    }

    fn lookup(&self, map: &TrajectoryMap, request: &LookupRequest) -> LookupResponse {
        let Some(offset) = self.extrinsics.get(&request.sensor_type) else {
            return LookupResponse::failed(LookupStatus::SensorTypeUnknown);
        };
        let Some(track) = map.robots.get(&request.robot_name) else {
            return LookupResponse::failed(LookupStatus::RobotUnknown);
        };
        let Some(pose) = track.pose_at(request.timestamp_ns) else {
            return LookupResponse::failed(LookupStatus::TimestampOutOfRange);
        };

        let sensor_origin = pose.position().add(&offset.rotate_yaw(pose.yaw));
        let point_global = sensor_origin.add(&request.point.rotate_yaw(pose.yaw));

        LookupResponse {
            status: LookupStatus::Ok,
            point_global,
            sensor_origin_global: sensor_origin,
        }
    }

    fn save_map(&self, map: &TrajectoryMap, folder: &Path) -> Result<()> {
        fs::create_dir_all(folder)?;

        let map_toml = toml::to_string_pretty(map)?;
        fs::write(folder.join(MERGED_MAP_FILE), map_toml)?;

        let info = MapInfo {
            robot_count: map.robots.len(),
            pose_count: map.pose_count(),
            merge_count: map.merge_count,
            saved_at_us: epoch_micros(),
            resource_folder: self.resource_folder.clone(),
        };
        fs::write(folder.join(MAP_INFO_FILE), toml::to_string_pretty(&info)?)?;

        log::info!(
            "Saved merged map to {} ({} robots, {} poses)",
            folder.display(),
            info.robot_count,
            info.pose_count
        );
        Ok(())
    }

    fn visualize_map(&self, map: &TrajectoryMap) {
        // Rendering is external; report what a renderer would receive.
        for (robot, track) in &map.robots {
            let span = match (track.poses.first(), track.poses.last()) {
                (Some(first), Some(last)) => last.timestamp_ns - first.timestamp_ns,
                _ => 0,
            };
            log::info!(
                "Visualize: robot '{}' with {} poses spanning {}ns",
                robot,
                track.poses.len(),
                span
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn pose(timestamp_ns: i64, x: f64, y: f64, yaw: f64) -> StampedPose {
        StampedPose {
            timestamp_ns,
            x,
            y,
            z: 0.0,
            yaw,
        }
    }

    fn task_for(dir: &Path) -> SubmapTask {
        SubmapTask {
            robot_id: "robot_a".to_string(),
            path: dir.to_path_buf(),
            enqueued_at_us: 0,
        }
    }

    fn write_submap(dir: &Path, contents: &str) {
        fs::write(dir.join(SUBMAP_FILE), contents).unwrap();
    }

    #[test]
    fn test_load_submap() {
        let dir = tempfile::tempdir().unwrap();
        write_submap(
            dir.path(),
            r#"
robot = "robot_a"
[[poses]]
timestamp_ns = 1000
x = 1.0
y = 2.0
z = 0.0
yaw = 0.0
"#,
        );

        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let submap = engine.load_submap(&task_for(dir.path())).unwrap();
        assert_eq!(submap.robot_id, "robot_a");
        assert_eq!(submap.poses.len(), 1);
        assert_eq!(submap.poses[0].x, 1.0);
    }

    #[test]
    fn test_load_submap_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        assert!(engine.load_submap(&task_for(dir.path())).is_err());
    }

    #[test]
    fn test_load_submap_empty_poses() {
        let dir = tempfile::tempdir().unwrap();
        write_submap(dir.path(), "poses = []\n");

        let engine = TrajectoryMapEngine::new("/tmp/resources");
        assert!(engine.load_submap(&task_for(dir.path())).is_err());
    }

    #[test]
    fn test_merge_appends_and_sorts() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let map = engine.empty_map();

        let first = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(3000, 3.0, 0.0, 0.0)],
        };
        let second = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(1000, 1.0, 0.0, 0.0), pose(2000, 2.0, 0.0, 0.0)],
        };

        let map = engine.merge_submap(&map, first).unwrap();
        let map = engine.merge_submap(&map, second).unwrap();

        assert_eq!(map.merge_count, 2);
        let track = &map.robots["robot_a"];
        let stamps: Vec<i64> = track.poses.iter().map(|p| p.timestamp_ns).collect();
        assert_eq!(stamps, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_merge_leaves_current_untouched() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let map = engine.empty_map();
        let submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(1000, 1.0, 0.0, 0.0)],
        };

        let merged = engine.merge_submap(&map, submap).unwrap();
        assert_eq!(map.merge_count, 0);
        assert!(map.robots.is_empty());
        assert_eq!(merged.merge_count, 1);
    }

    #[test]
    fn test_unknown_command() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let mut submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(1000, 0.0, 0.0, 0.0)],
        };
        let result = engine.apply_submap_command("no_such_command", &mut submap);
        assert!(matches!(result, Err(Error::UnknownCommand(_))));

        let mut map = engine.empty_map();
        let result = engine.apply_global_command("no_such_command", &mut map);
        assert!(matches!(result, Err(Error::UnknownCommand(_))));
    }

    #[test]
    fn test_validate_timestamps_rejects_unsorted() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let mut submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(2000, 0.0, 0.0, 0.0), pose(1000, 0.0, 0.0, 0.0)],
        };
        assert!(
            engine
                .apply_submap_command("validate_timestamps", &mut submap)
                .is_err()
        );

        engine
            .apply_submap_command("sort_poses", &mut submap)
            .unwrap();
        assert!(
            engine
                .apply_submap_command("validate_timestamps", &mut submap)
                .is_ok()
        );
    }

    #[test]
    fn test_lookup_statuses() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(1000, 0.0, 0.0, 0.0), pose(2000, 1.0, 0.0, 0.0)],
        };
        let map = engine.merge_submap(&engine.empty_map(), submap).unwrap();

        let mut request = LookupRequest {
            robot_name: "robot_a".to_string(),
            sensor_type: "imu".to_string(),
            timestamp_ns: 1500,
            point: Point3::zero(),
        };
        assert_eq!(engine.lookup(&map, &request).status, LookupStatus::Ok);

        request.robot_name = "robot_b".to_string();
        assert_eq!(
            engine.lookup(&map, &request).status,
            LookupStatus::RobotUnknown
        );

        request.robot_name = "robot_a".to_string();
        request.timestamp_ns = 5000;
        assert_eq!(
            engine.lookup(&map, &request).status,
            LookupStatus::TimestampOutOfRange
        );

        request.timestamp_ns = 1500;
        request.sensor_type = "sonar".to_string();
        assert_eq!(
            engine.lookup(&map, &request).status,
            LookupStatus::SensorTypeUnknown
        );
    }

    #[test]
    fn test_lookup_interpolates_position() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(1000, 0.0, 0.0, 0.0), pose(2000, 2.0, 0.0, 0.0)],
        };
        let map = engine.merge_submap(&engine.empty_map(), submap).unwrap();

        let request = LookupRequest {
            robot_name: "robot_a".to_string(),
            sensor_type: "imu".to_string(),
            timestamp_ns: 1500,
            point: Point3::zero(),
        };
        let response = engine.lookup(&map, &request);
        assert_eq!(response.status, LookupStatus::Ok);
        assert!((response.sensor_origin_global.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookup_rotates_sensor_point() {
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            // Facing +Y: a point 1m ahead in the sensor frame lands at +Y.
            poses: vec![
                pose(1000, 0.0, 0.0, FRAC_PI_2),
                pose(2000, 0.0, 0.0, FRAC_PI_2),
            ],
        };
        let map = engine.merge_submap(&engine.empty_map(), submap).unwrap();

        let request = LookupRequest {
            robot_name: "robot_a".to_string(),
            sensor_type: "imu".to_string(),
            timestamp_ns: 1500,
            point: Point3::new(1.0, 0.0, 0.0),
        };
        let response = engine.lookup(&map, &request);
        assert_eq!(response.status, LookupStatus::Ok);
        assert!(response.point_global.x.abs() < 1e-9);
        assert!((response.point_global.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_map_writes_folder() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrajectoryMapEngine::new("/tmp/resources");
        let submap = TrajectorySubmap {
            robot_id: "robot_a".to_string(),
            poses: vec![pose(1000, 0.0, 0.0, 0.0)],
        };
        let map = engine.merge_submap(&engine.empty_map(), submap).unwrap();

        let out = dir.path().join("merged");
        engine.save_map(&map, &out).unwrap();

        assert!(out.join(MERGED_MAP_FILE).exists());
        assert!(out.join(MAP_INFO_FILE).exists());

        // Round-trip the merged map file.
        let contents = fs::read_to_string(out.join(MERGED_MAP_FILE)).unwrap();
        let restored: TrajectoryMap = toml::from_str(&contents).unwrap();
        assert_eq!(restored.merge_count, 1);
        assert_eq!(restored.robots["robot_a"].poses.len(), 1);
    }
}
