//! Configuration for the map-aggregation server.
//!
//! Loads configuration from a TOML file once at startup. There is no live
//! reload; all values are immutable after load and passed explicitly at
//! construction.
//!
//! Two layers:
//! - [`PipelineConfig`]: the two ordered command lists executed around each
//!   merge. Both fields are required; identifiers are opaque strings resolved
//!   by the engine at execution time, not validated here.
//! - [`ServerConfig`]: startup parameters (output folders, backup interval,
//!   transport hints) with documented defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Ordered pipeline command lists, loaded once at startup.
///
/// Order is semantically significant (commands execute in declared order)
/// and duplicates are preserved verbatim. Serialization is a faithful
/// inverse of loading.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Commands run against each submap before merging, in order.
    pub submap_commands: Vec<String>,
    /// Commands run against the merged map after each merge, in order.
    pub global_map_commands: Vec<String>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a TOML file.
    ///
    /// Fails when the file is missing or either command list is absent.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse pipeline configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Serialize to a TOML string; inverse of [`Self::from_toml_str`].
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save pipeline configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

/// Server startup parameters.
///
/// All fields have defaults; deployments override them in the `[server]`
/// section of the daemon configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Folder the merged map is written to by save and backup.
    pub merged_map_folder: PathBuf,
    /// Folder for engine-owned auxiliary resources.
    pub resource_folder: PathBuf,
    /// Periodic backup interval in seconds (0 disables backups).
    pub backup_interval_s: u64,
    /// Topic the transport adapter subscribes to for submap notifications.
    pub notification_topic: String,
    /// Subscriber queue size hint for the transport adapter.
    ///
    /// The intake queue itself is unbounded and never blocks producers.
    pub queue_capacity_hint: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            merged_map_folder: PathBuf::from("/var/lib/sangraha/merged_map"),
            resource_folder: PathBuf::from("/var/lib/sangraha/resources"),
            backup_interval_s: 300,
            notification_topic: "map_update_notification".to_string(),
            queue_capacity_hint: 100,
        }
    }
}

/// Top-level daemon configuration.
///
/// The `[pipeline]` section is required; a daemon without its command lists
/// is considered misconfigured and fails at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Startup parameters.
    #[serde(default)]
    pub server: ServerConfig,
    /// Pipeline command lists.
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load daemon configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save daemon configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_round_trip() {
        let config = PipelineConfig {
            submap_commands: vec!["a".to_string(), "b".to_string()],
            global_map_commands: vec!["c".to_string()],
        };

        let toml_string = config.to_toml_string().unwrap();
        let parsed = PipelineConfig::from_toml_str(&toml_string).unwrap();

        assert_eq!(parsed.submap_commands, vec!["a", "b"]);
        assert_eq!(parsed.global_map_commands, vec!["c"]);
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_pipeline_preserves_order_and_duplicates() {
        let toml_content = r#"
submap_commands = ["opt", "prune", "opt"]
global_map_commands = []
"#;
        let config = PipelineConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.submap_commands, vec!["opt", "prune", "opt"]);
        assert!(config.global_map_commands.is_empty());
    }

    #[test]
    fn test_pipeline_missing_field_fails() {
        let toml_content = r#"
submap_commands = ["a"]
"#;
        assert!(PipelineConfig::from_toml_str(toml_content).is_err());
    }

    #[test]
    fn test_pipeline_missing_file_fails() {
        assert!(PipelineConfig::from_file("/nonexistent/pipeline.toml").is_err());
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.backup_interval_s, 300);
        assert_eq!(config.notification_topic, "map_update_notification");
        assert_eq!(config.queue_capacity_hint, 100);
    }

    #[test]
    fn test_daemon_config_requires_pipeline() {
        let toml_content = r#"
[server]
backup_interval_s = 60
"#;
        assert!(toml::from_str::<Config>(toml_content).is_err());
    }

    #[test]
    fn test_daemon_config_defaults_server_section() {
        let toml_content = r#"
[pipeline]
submap_commands = ["summarize"]
global_map_commands = []
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.backup_interval_s, 300);
        assert_eq!(config.pipeline.submap_commands, vec!["summarize"]);
    }
}
