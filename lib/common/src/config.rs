//! Configuration of the sampling engine.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`CRTDASH__FAST_INTERVAL_MS=1000`, ...). Command-line
//! flags are applied on top by the caller through the setters.

use config::{Config, ConfigError as SourceError, Environment, File, FileFormat};
use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Interval of the fast producer (CPU, memory, network), in milliseconds.
pub const DEFAULT_FAST_INTERVAL_MS: u64 = 2_000;

/// Interval of the slow producer (disk), in seconds. Disk capacity moves
/// slowly and the query is comparatively expensive.
pub const DEFAULT_SLOW_INTERVAL_SECS: u64 = 30;

/// Mount point whose volume backs the disk gauge.
pub const DEFAULT_DISK_MOUNT_POINT: &str = "/";

/// Configuration file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "crtdash.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "CRTDASH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] SourceError),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("Slow interval ({slow:?}) must not be shorter than the fast interval ({fast:?})")]
    IntervalOrder { fast: Duration, slow: Duration },

    #[error("Disk mount point must not be empty")]
    EmptyMountPoint,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters, Setters, TypedBuilder,
)]
#[getset(get = "pub", set = "pub")]
pub struct MonitorConfig {
    #[builder(default = DEFAULT_FAST_INTERVAL_MS)]
    fast_interval_ms: u64,
    #[builder(default = DEFAULT_SLOW_INTERVAL_SECS)]
    slow_interval_secs: u64,
    #[builder(default = PathBuf::from(DEFAULT_DISK_MOUNT_POINT))]
    disk_mount_point: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig::builder().build()
    }
}

impl MonitorConfig {
    /// Loads configuration from defaults, `path` (or `crtdash.toml` if present)
    /// and `CRTDASH__*` environment variables, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    /// Like [`MonitorConfig::load`] with a custom environment prefix.
    pub fn load_with_env_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let file = match path {
            // An explicitly requested file has to exist
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        let config = Config::builder()
            .set_default("fast_interval_ms", DEFAULT_FAST_INTERVAL_MS as i64)?
            .set_default("slow_interval_secs", DEFAULT_SLOW_INTERVAL_SECS as i64)?
            .set_default("disk_mount_point", DEFAULT_DISK_MOUNT_POINT)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<MonitorConfig>()?;

        config.validate()?;
        debug!(?config, "Loaded configuration");

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("fast_interval_ms"));
        }
        if self.slow_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("slow_interval_secs"));
        }
        if self.slow_interval() < self.fast_interval() {
            return Err(ConfigError::IntervalOrder {
                fast: self.fast_interval(),
                slow: self.slow_interval(),
            });
        }
        if self.disk_mount_point.as_os_str().is_empty() {
            return Err(ConfigError::EmptyMountPoint);
        }

        Ok(())
    }

    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_secs(self.slow_interval_secs)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::env;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(temp_file, "{}", contents).unwrap();
        temp_file
    }

    #[test]
    fn defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.fast_interval(), Duration::from_secs(2));
        assert_eq!(config.slow_interval(), Duration::from_secs(30));
        assert_eq!(config.disk_mount_point(), &PathBuf::from("/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = MonitorConfig::load_with_env_prefix(None, "CRTDASH_TEST_DEFAULTS").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn load_valid_config_from_file() {
        let temp_file = write_config(
            r#"
            fast_interval_ms = 1000
            slow_interval_secs = 60
            disk_mount_point = "/home"
        "#,
        );

        let config =
            MonitorConfig::load_with_env_prefix(Some(temp_file.path()), "CRTDASH_TEST_FILE")
                .unwrap();

        assert_eq!(config.fast_interval_ms(), &1000);
        assert_eq!(config.slow_interval(), Duration::from_secs(60));
        assert_eq!(config.disk_mount_point(), &PathBuf::from("/home"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp_file = write_config("slow_interval_secs = 45");

        let config =
            MonitorConfig::load_with_env_prefix(Some(temp_file.path()), "CRTDASH_TEST_PARTIAL")
                .unwrap();

        assert_eq!(config.fast_interval_ms(), &DEFAULT_FAST_INTERVAL_MS);
        assert_eq!(config.slow_interval_secs(), &45);
    }

    #[test]
    fn override_config_with_env_vars() {
        let temp_file = write_config("fast_interval_ms = 1000");
        env::set_var("CRTDASH_TEST_ENV__FAST_INTERVAL_MS", "500");

        let config =
            MonitorConfig::load_with_env_prefix(Some(temp_file.path()), "CRTDASH_TEST_ENV");
        env::remove_var("CRTDASH_TEST_ENV__FAST_INTERVAL_MS");

        // Environment variables should override file config
        assert_eq!(config.unwrap().fast_interval_ms(), &500);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = MonitorConfig::load_with_env_prefix(
            Some(Path::new("/nonexistent/crtdash.toml")),
            "CRTDASH_TEST_MISSING",
        );
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn invalid_file_contents_are_rejected() {
        let temp_file = write_config("fast_interval_ms = \"soon\"");
        let result =
            MonitorConfig::load_with_env_prefix(Some(temp_file.path()), "CRTDASH_TEST_INVALID");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = MonitorConfig::builder().fast_interval_ms(0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval("fast_interval_ms"))
        ));

        let config = MonitorConfig::builder().slow_interval_secs(0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval("slow_interval_secs"))
        ));
    }

    #[test]
    fn slow_interval_shorter_than_fast_is_rejected() {
        let config = MonitorConfig::builder()
            .fast_interval_ms(10_000)
            .slow_interval_secs(5)
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IntervalOrder { .. })
        ));
    }

    #[test]
    fn empty_mount_point_is_rejected() {
        let config = MonitorConfig::builder()
            .disk_mount_point(PathBuf::new())
            .build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyMountPoint)
        ));
    }

    #[test]
    fn setters_apply_overrides() {
        let mut config = MonitorConfig::default();
        config.set_fast_interval_ms(250).set_slow_interval_secs(5);
        assert_eq!(config.fast_interval(), Duration::from_millis(250));
        assert_eq!(config.slow_interval(), Duration::from_secs(5));
    }
}
