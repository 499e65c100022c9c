use thiserror::Error;

/// Result type used by the logger.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, installing or shutting down a logger.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file could not be parsed.
    #[error("invalid logger configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// The configured level is not a known level name.
    #[error("unknown log level: {0}")]
    InvalidLevel(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Could not install the global subscriber.
    #[error("could not install global subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),

    /// Could not change the level filter.
    #[error("could not change log level: {0}")]
    Reload(#[from] tracing_subscriber::reload::Error),

    /// The rotating file rejected its configuration.
    #[error(transparent)]
    Rotate(#[from] logroll_rotate::Error),

    /// The buffered sink failed to start or stop.
    #[error(transparent)]
    Sink(#[from] logroll_sink::Error),
}
