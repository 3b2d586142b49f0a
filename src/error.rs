//! Unified error types for checkup

use nix::errno::Errno;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for checkup operations
///
/// A failing health check is never an error: it is a `false` outcome plus a
/// log line. Errors are reserved for configuration problems and for
/// conditions that make the whole run untrustworthy.
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to parse config: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    #[error("Service '{0}' not found in config")]
    UnknownService(String),

    // Check engine errors
    #[error("Failed to kill timed out command '{command}' (pid {pid}): {source}")]
    KillFailed {
        command: String,
        pid: i32,
        source: Errno,
    },

    #[error("Check worker for service '{service}' panicked")]
    WorkerPanicked { service: String },

    #[error("Invalid retry state transition: {0}")]
    Transition(String),

    #[error("Interrupted")]
    Cancelled,

    #[error("Failed to start signal watcher: {0}")]
    Runtime(String),

    // Output errors
    #[error("Failed to render report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for checkup operations
pub type Result<T> = std::result::Result<T, Error>;
