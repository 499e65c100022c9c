use crate::error::{Error, Result};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MEGABYTE: u64 = 1024 * 1024;

/// Default maximum size of the active file before it is rotated.
pub const DEFAULT_MAX_SIZE: u64 = 100 * MEGABYTE;

/// Rotation and retention settings for a [`RotatingFile`](crate::RotatingFile).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Path of the active log file. Backups are written next to it.
    pub filename: PathBuf,

    /// Size in bytes at which the active file is rotated.
    pub max_size: u64,

    /// Rotated files older than this are removed. `None` keeps them forever.
    pub max_age: Option<Duration>,

    /// Number of rotated files to keep. `None` keeps all of them.
    pub max_backups: Option<usize>,

    /// Use local time rather than UTC in backup file names.
    pub local_time: bool,

    /// Gzip rotated files.
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("access.log"),
            max_size: DEFAULT_MAX_SIZE,
            max_age: None,
            max_backups: None,
            local_time: false,
            compress: false,
        }
    }
}

impl RotationConfig {
    /// Configuration for `filename` with every other setting at its default.
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Sets the maximum size in megabytes.
    #[must_use]
    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_size = megabytes.saturating_mul(MEGABYTE);
        self
    }

    /// Sets the maximum size in bytes.
    #[must_use]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Sets the maximum age of rotated files in days.
    #[must_use]
    pub fn with_max_age_days(mut self, days: u64) -> Self {
        self.max_age = Some(Duration::from_secs(days.saturating_mul(24 * 60 * 60)));
        self
    }

    /// Sets the maximum age of rotated files.
    #[must_use]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Sets the number of rotated files to keep.
    #[must_use]
    pub fn with_max_backups(mut self, backups: usize) -> Self {
        self.max_backups = Some(backups);
        self
    }

    /// Selects local time for backup names.
    #[must_use]
    pub fn with_local_time(mut self, local_time: bool) -> Self {
        self.local_time = local_time;
        self
    }

    /// Enables or disables gzip compression of rotated files.
    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }

        if self.filename.file_name().is_none() {
            return Err(Error::InvalidConfig(format!(
                "filename {} has no file name component",
                self.filename.display()
            )));
        }

        Ok(())
    }
}
