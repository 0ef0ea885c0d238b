//! Deployment step execution.

use doctor_target::TargetSystem;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::diagnostics::{DiagnosticLog, FailureKind};
use crate::domain::{DeploymentStep, DoctorError, FixCategory, Result, StepOutcome};
use crate::op::execute_op;

/// Runs one step at a time against the target. No retries here: retrying
/// after remediation is the driver's job.
pub struct StepSequencer {
    target: Arc<dyn TargetSystem>,
}

impl StepSequencer {
    pub fn new(target: Arc<dyn TargetSystem>) -> Self {
        Self { target }
    }

    /// Execute `step` once.
    pub async fn run_step(&self, step: &DeploymentStep) -> StepOutcome {
        info!(step = %step.name, critical = step.critical, "Executing step");
        let outcome = execute_op(self.target.as_ref(), &step.action).await;

        if outcome.success {
            info!(step = %step.name, duration_ms = outcome.duration_ms, "Step passed");
        } else {
            warn!(step = %step.name, exit = %outcome.exit_info, "Step failed");
        }

        StepOutcome {
            success: outcome.success,
            exit_info: outcome.exit_info,
            output: outcome.output,
            duration_ms: outcome.duration_ms,
        }
    }

    /// Apply the step's failure policy to a final (post-retry) failure.
    ///
    /// Critical: narrative plus `CriticalStepFailure`, which the driver turns
    /// into an aborted run. Soft: warning narrative, `Ok` so the run continues.
    pub fn settle_failure(
        &self,
        step: &DeploymentStep,
        outcome: &StepOutcome,
        remediated: &[FixCategory],
        diagnostics: &mut DiagnosticLog,
    ) -> Result<()> {
        let attempted = if remediated.is_empty() {
            "none".to_string()
        } else {
            remediated
                .iter()
                .map(FixCategory::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let excerpt = excerpt(&outcome.output);

        if step.critical {
            error!(step = %step.name, exit = %outcome.exit_info, "Critical step failed after remediation");
            diagnostics.push(
                FailureKind::CriticalStepFailure,
                format!(
                    "critical step '{}' failed after remediation [{}]: {}{}",
                    step.name, attempted, outcome.exit_info, excerpt
                ),
            );
            Err(DoctorError::CriticalStepFailure {
                step: step.name.clone(),
                detail: outcome.exit_info.clone(),
            })
        } else {
            warn!(step = %step.name, "Soft step failed, continuing");
            diagnostics.push(
                FailureKind::SoftStepFailure,
                format!(
                    "step '{}' failed after remediation [{}], continuing: {}{}",
                    step.name, attempted, outcome.exit_info, excerpt
                ),
            );
            Ok(())
        }
    }
}

/// Last non-empty output line, for narratives.
fn excerpt(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| format!(" ({})", l))
        .unwrap_or_default()
}
