//! Error types for doctor-target

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the target system
#[derive(Error, Debug)]
pub enum TargetError {
    /// Command had no executable
    #[error("Command for {0} is empty")]
    EmptyCommand(String),

    /// Command could not be spawned (binary missing, permissions)
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command did not finish within its budget
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// HTTP client could not be built or request failed outright
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TargetError {
    fn from(err: reqwest::Error) -> Self {
        TargetError::Http(err.to_string())
    }
}
