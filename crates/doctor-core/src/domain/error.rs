//! Error taxonomy for deploy-doctor.

use std::path::PathBuf;

use doctor_target::TargetError;

/// Errors that end (or refuse to start) an orchestration run.
///
/// Soft step failures and exhausted remediation never abort a run, so they
/// are narratives (see [`FailureKind`](crate::diagnostics::FailureKind)),
/// not errors.
#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("critical step '{step}' failed: {detail}")]
    CriticalStepFailure { step: String, detail: String },

    #[error("another run holds the lock at {}", path.display())]
    RunLocked { path: PathBuf },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("target error: {0}")]
    Target(#[from] TargetError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for deploy-doctor operations.
pub type Result<T> = std::result::Result<T, DoctorError>;
