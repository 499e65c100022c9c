//! Service logger writing through a buffered, rotating log file.
//!
//! [`Logger::build`] wires a `tracing` subscriber whose file layer hands each
//! formatted line to a [`BufferedSink`] in front of a [`RotatingFile`], and
//! which can mirror every line to stdout. The level filter can be changed at
//! runtime with [`Logger::set_level`].
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod timer;

pub use config::{
    DEFAULT_FILE_NAME, DEFAULT_NAME, DEFAULT_PATH, LoggerConfig, RotationSettings,
};
pub use error::{Error, Result};
pub use timer::{LocalTimer, TIME_FORMAT};

pub use tracing_subscriber::filter::LevelFilter;

use std::fs;
use std::path::{Path, PathBuf};

use logroll_rotate::RotatingFile;
use logroll_sink::{BufferedSink, SinkState};
use tracing::Dispatch;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};

type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// A built logger. Owns the sink behind the log file.
///
/// Dropping the logger stops the sink, flushing whatever it still buffers.
/// Events recorded afterwards through a still-installed subscriber are
/// dropped.
#[derive(Debug)]
pub struct Logger {
    dispatch: Dispatch,
    sink: BufferedSink,
    level: LevelHandle,
    log_file: PathBuf,
}

impl Logger {
    /// Creates the log directory, the rotating file, the sink and the
    /// subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is unknown, the log directory cannot be
    /// created, or the rotating file or sink reject their configuration.
    pub fn build(config: &LoggerConfig) -> Result<Self> {
        let level = config.level_filter()?;

        let log_dir = config.log_dir();
        fs::create_dir_all(&log_dir)
            .map_err(|e| Error::Io("failed to create log directory", e))?;

        let rotation = config.rotation_config();
        let log_file = rotation.filename.clone();
        let file = RotatingFile::new(rotation)?;
        let sink = BufferedSink::new(file, config.sink.clone())?;

        let (level_layer, level_handle) = reload::Layer::new(level);

        let stdout_layer = config.stdout.then(|| {
            fmt::layer()
                .with_timer(LocalTimer)
                .with_ansi(!config.production)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stdout)
        });

        // Errors from a stopped sink are expected after shutdown.
        let file_layer = fmt::layer()
            .with_timer(LocalTimer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .log_internal_errors(false)
            .with_writer(sink.clone());

        let subscriber = tracing_subscriber::registry()
            .with(level_layer)
            .with(stdout_layer)
            .with(file_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            sink,
            level: level_handle,
            log_file,
        })
    }

    /// The subscriber, for use with [`tracing::dispatcher::with_default`].
    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Sets this logger as the global default subscriber and routes records
    /// from the `log` crate into it.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber or `log` logger is already set.
    pub fn install(&self) -> Result<()> {
        self.dispatch.clone().try_init()?;
        Ok(())
    }

    /// Replaces the level filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscriber has been dropped.
    pub fn set_level(&self, level: LevelFilter) -> Result<()> {
        self.level.reload(level)?;
        Ok(())
    }

    /// Level filter currently in effect.
    #[must_use]
    pub fn level(&self) -> Option<LevelFilter> {
        self.level.clone_current()
    }

    /// Stops the sink, flushing buffered lines to the log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the logger was already shut down.
    pub fn shutdown(&self) -> Result<()> {
        self.sink.stop()?;
        Ok(())
    }

    /// The sink behind the log file.
    #[must_use]
    pub const fn sink(&self) -> &BufferedSink {
        &self.sink
    }

    /// Path of the active log file.
    #[must_use]
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // The installed dispatch keeps a sink handle alive, so stop explicitly.
        if self.sink.state() == SinkState::Running {
            let _ = self.sink.stop();
        }
    }
}
