use thiserror::Error;

/// Result type used by the sink.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to producers and to whoever constructs or stops a sink.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration cannot be used to build a sink.
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The pending queue had no room for the record.
    #[error("sink queue is full")]
    QueueFull,

    /// The sink has been stopped and no longer accepts records.
    #[error("sink closed")]
    SinkClosed,
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::QueueFull => std::io::ErrorKind::WouldBlock,
            Error::SinkClosed => std::io::ErrorKind::BrokenPipe,
            Error::InvalidConfig(_) => std::io::ErrorKind::InvalidInput,
            Error::Io(_, source) => source.kind(),
        };

        Self::new(kind, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    #[test]
    fn test_io_conversion_keeps_context() {
        let error = Error::Io(
            "failed to spawn sink worker",
            io::Error::from(io::ErrorKind::OutOfMemory),
        );

        let converted = io::Error::from(error);

        assert_eq!(converted.kind(), io::ErrorKind::OutOfMemory);
        assert!(converted.to_string().starts_with("failed to spawn sink worker: "));
    }

    #[test]
    fn test_queue_full_would_block() {
        assert_eq!(
            io::Error::from(Error::QueueFull).kind(),
            io::ErrorKind::WouldBlock
        );
    }
}
