use crate::error::{Error, Result};

use std::path::PathBuf;
use std::str::FromStr;

use logroll_rotate::RotationConfig;
use logroll_sink::SinkConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Subdirectory used when `name` is empty.
pub const DEFAULT_NAME: &str = "server";

/// Base directory used when `path` is empty.
pub const DEFAULT_PATH: &str = ".";

/// File name of the active log inside the log directory.
pub const DEFAULT_FILE_NAME: &str = "access.log";

/// Rotation settings as they appear in configuration files.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct RotationSettings {
    /// Size in megabytes at which the log file is rotated.
    pub max_size_mb: u64,

    /// Days to keep rotated files. `None` keeps them forever.
    pub max_age_days: Option<u64>,

    /// Number of rotated files to keep. `None` keeps all of them.
    pub max_backups: Option<usize>,

    /// Gzip rotated files.
    pub compress: bool,

    /// Use local time in rotated file names.
    pub local_time: bool,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_size_mb: 500,
            max_age_days: Some(15),
            max_backups: None,
            compress: true,
            local_time: true,
        }
    }
}

/// Logger configuration.
///
/// The log file lives at `<path>/<name>/<file_name>`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Service name, used as the log subdirectory.
    pub name: String,

    /// Base directory for logs.
    pub path: PathBuf,

    /// File name of the active log.
    pub file_name: String,

    /// Production mode logs at `info` without colours; development mode logs
    /// at `debug` with colours on stdout.
    pub production: bool,

    /// Mirror every line to stdout.
    pub stdout: bool,

    /// Overrides the level implied by `production`.
    pub level: Option<String>,

    /// Rotation of the log file.
    pub rotation: RotationSettings,

    /// Buffering between the encoder and the log file.
    pub sink: SinkConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            path: PathBuf::from(DEFAULT_PATH),
            file_name: DEFAULT_FILE_NAME.to_string(),
            production: true,
            stdout: true,
            level: None,
            rotation: RotationSettings::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// Production configuration for service `name` under `path`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Parses a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or has mistyped keys.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Directory holding the active log and its rotations.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        let base = if self.path.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_PATH)
        } else {
            self.path.clone()
        };

        if self.name.is_empty() {
            base.join(DEFAULT_NAME)
        } else {
            base.join(&self.name)
        }
    }

    /// Full path of the active log.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        let file_name = if self.file_name.is_empty() {
            DEFAULT_FILE_NAME
        } else {
            &self.file_name
        };

        self.log_dir().join(file_name)
    }

    /// Level filter in effect at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if `level` names an unknown level.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        match &self.level {
            Some(level) => {
                LevelFilter::from_str(level).map_err(|_| Error::InvalidLevel(level.clone()))
            }
            None if self.production => Ok(LevelFilter::INFO),
            None => Ok(LevelFilter::DEBUG),
        }
    }

    /// Rotation settings resolved against the log file path.
    #[must_use]
    pub fn rotation_config(&self) -> RotationConfig {
        let rotation = &self.rotation;

        let mut config = RotationConfig::new(self.log_file())
            .with_max_size_mb(rotation.max_size_mb)
            .with_compress(rotation.compress)
            .with_local_time(rotation.local_time);

        if let Some(days) = rotation.max_age_days {
            config = config.with_max_age_days(days);
        }
        if let Some(backups) = rotation.max_backups {
            config = config.with_max_backups(backups);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();

        assert_eq!(config.log_file(), Path::new("./server/access.log"));
        assert_eq!(config.level_filter().unwrap(), LevelFilter::INFO);

        let rotation = config.rotation_config();
        assert_eq!(rotation.max_size, 500 * 1024 * 1024);
        assert_eq!(
            rotation.max_age,
            Some(Duration::from_secs(15 * 24 * 60 * 60))
        );
        assert_eq!(rotation.max_backups, None);
        assert!(rotation.compress);
        assert!(rotation.local_time);
    }

    #[test]
    fn test_empty_name_and_path_fall_back() {
        let config = LoggerConfig::new("", "");

        assert_eq!(config.log_dir(), Path::new("./server"));
    }

    #[test]
    fn test_development_level() {
        let config = LoggerConfig {
            production: false,
            ..LoggerConfig::default()
        };

        assert_eq!(config.level_filter().unwrap(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_explicit_level() {
        let mut config = LoggerConfig::default();

        config.level = Some("warn".to_string());
        assert_eq!(config.level_filter().unwrap(), LevelFilter::WARN);

        config.level = Some("loud".to_string());
        assert!(matches!(
            config.level_filter(),
            Err(Error::InvalidLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = LoggerConfig::from_toml_str(
            r#"
            name = "gateway"
            path = "/var/log"
            production = false

            [rotation]
            max_size_mb = 10
            max_backups = 3
            compress = false

            [sink]
            flush_threshold = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.log_file(), Path::new("/var/log/gateway/access.log"));
        assert!(!config.production);
        assert!(config.stdout);
        assert_eq!(config.rotation.max_size_mb, 10);
        assert_eq!(config.rotation.max_age_days, Some(15));
        assert_eq!(config.rotation.max_backups, Some(3));
        assert!(!config.rotation.compress);
        assert_eq!(config.sink.flush_threshold, 4096);
        assert_eq!(config.sink.queue_capacity, 5000);
    }

    #[test]
    fn test_from_toml_rejects_mistyped_keys() {
        let result = LoggerConfig::from_toml_str("production = \"yes\"");

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
