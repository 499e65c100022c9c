use thiserror::Error;

/// Result type used by the rotating file.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while writing or rotating log files.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration cannot be used.
    #[error("invalid rotation configuration: {0}")]
    InvalidConfig(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// A single write would not fit in an empty file.
    #[error("write length {len} exceeds maximum file size {max}")]
    WriteTooLarge {
        /// Length of the rejected write.
        len: u64,
        /// Configured maximum file size.
        max: u64,
    },
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::Io(_, source) => source.kind(),
            Error::InvalidConfig(_) | Error::WriteTooLarge { .. } => {
                std::io::ErrorKind::InvalidInput
            }
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
            "failed to rename log file",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );

        let converted = io::Error::from(error);

        assert_eq!(converted.kind(), io::ErrorKind::PermissionDenied);
        assert!(converted.to_string().starts_with("failed to rename log file: "));
    }

    #[test]
    fn test_oversize_write_is_invalid_input() {
        let converted = io::Error::from(Error::WriteTooLarge { len: 8, max: 4 });

        assert_eq!(converted.kind(), io::ErrorKind::InvalidInput);
    }
}
