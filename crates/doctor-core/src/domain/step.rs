//! Deployment steps and their outcomes.

use serde::{Deserialize, Serialize};

use super::FixCategory;
use crate::op::TargetOp;

/// One named action in the deployment plan.
///
/// Steps are built once per run; a retry re-executes the same instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStep {
    pub name: String,
    pub action: TargetOp,

    /// A failed critical step aborts the run; a soft one is logged and skipped.
    pub critical: bool,

    /// Component whose recent logs are classified alongside the step output.
    pub log_component: Option<String>,
}

impl DeploymentStep {
    pub fn critical(name: impl Into<String>, action: TargetOp) -> Self {
        Self {
            name: name.into(),
            action,
            critical: true,
            log_component: None,
        }
    }

    pub fn soft(name: impl Into<String>, action: TargetOp) -> Self {
        Self {
            name: name.into(),
            action,
            critical: false,
            log_component: None,
        }
    }

    /// Also classify recent logs of `component` when this step fails.
    pub fn with_logs_from(mut self, component: impl Into<String>) -> Self {
        self.log_component = Some(component.into());
        self
    }
}

/// Result of executing one step once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepOutcome {
    pub success: bool,

    /// Short exit description (`exit 0`, `exit 1`, `timed out after 60s`).
    pub exit_info: String,

    /// Captured output used for fault classification.
    pub output: String,

    pub duration_ms: u64,
}

/// Per-step line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub critical: bool,
    pub attempts: u32,
    pub success: bool,
    pub exit_info: String,

    /// Categories remediated between the first attempt and the retry.
    pub remediated: Vec<FixCategory>,
}
