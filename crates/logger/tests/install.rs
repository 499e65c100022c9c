//! Installs a global subscriber, so it lives in its own test binary.

use std::fs;

use logroll_logger::{Logger, LoggerConfig};
use tempfile::tempdir;

#[test]
fn test_install_routes_tracing_and_log() {
    let dir = tempdir().unwrap();
    let config = LoggerConfig {
        stdout: false,
        ..LoggerConfig::new("gateway", dir.path())
    };
    let logger = Logger::build(&config).unwrap();

    logger.install().unwrap();

    tracing::info!("from tracing");
    log::warn!("from the log facade");

    let second = Logger::build(&config).unwrap();
    assert!(second.install().is_err());
    second.shutdown().unwrap();

    logger.shutdown().unwrap();

    let contents = fs::read_to_string(logger.log_file()).unwrap();
    assert!(contents.contains("from tracing"));
    assert!(contents.contains("WARN"));
    assert!(contents.contains("from the log facade"));
}
