//! The orchestrator state machine.
//!
//! ```text
//! Planning -> Running -> Verifying -> RemediatingFinal -> VerifyingFinal -> {Succeeded, Failed}
//! ```
//!
//! A step failure is classified, remediated and retried once before the
//! step's critical flag decides whether the run continues. After the
//! pipeline, one failed verification buys exactly one comprehensive
//! remediation pass and one more verification.

use chrono::Utc;
use doctor_target::TargetSystem;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classifier::{DiagnosticSignal, FaultClassifier};
use crate::config::RunContext;
use crate::diagnostics::{DiagnosticLog, FailureKind};
use crate::domain::{
    DeploymentStep, FixCategory, Result, StepOutcome, StepRecord, VerificationResult,
};
use crate::ledger::AppliedFixLedger;
use crate::plan::DeploymentPlan;
use crate::remediation::{RemediationRecord, RemediationRegistry};
use crate::report::RunReport;
use crate::sequencer::StepSequencer;
use crate::verifier::Verifier;

/// Driver states, recorded in order in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Planning,
    Running,
    Verifying,
    RemediatingFinal,
    VerifyingFinal,
    Succeeded,
    Failed,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverState::Planning => "planning",
            DriverState::Running => "running",
            DriverState::Verifying => "verifying",
            DriverState::RemediatingFinal => "remediating(final)",
            DriverState::VerifyingFinal => "verifying(final)",
            DriverState::Succeeded => "succeeded",
            DriverState::Failed => "failed",
        }
    }
}

/// Terminal verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

impl RunOutcome {
    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Succeeded => 0,
            RunOutcome::Failed => 1,
        }
    }

    fn state(&self) -> DriverState {
        match self {
            RunOutcome::Succeeded => DriverState::Succeeded,
            RunOutcome::Failed => DriverState::Failed,
        }
    }
}

/// One orchestration run. Owns the ledger and diagnostic log; consumed by
/// [`Orchestrator::run`].
pub struct Orchestrator {
    target: Arc<dyn TargetSystem>,
    sequencer: StepSequencer,
    plan: DeploymentPlan,
    registry: RemediationRegistry,
    verifier: Verifier,
    classifier: FaultClassifier,
    log_window: Duration,

    ledger: AppliedFixLedger,
    diagnostics: DiagnosticLog,
    states: Vec<DriverState>,
    steps: Vec<StepRecord>,
    remediations: Vec<RemediationRecord>,
    verifications: Vec<VerificationResult>,
}

impl Orchestrator {
    /// Orchestrator with the standard plan, routines and checks for `ctx`.
    pub fn new(target: Arc<dyn TargetSystem>, ctx: &RunContext) -> Self {
        Self {
            sequencer: StepSequencer::new(Arc::clone(&target)),
            target,
            plan: DeploymentPlan::standard(ctx),
            registry: RemediationRegistry::standard(ctx),
            verifier: Verifier::from_context(ctx),
            classifier: FaultClassifier::standard(),
            log_window: ctx.log_window,
            ledger: AppliedFixLedger::new(),
            diagnostics: DiagnosticLog::new(),
            states: Vec::new(),
            steps: Vec::new(),
            remediations: Vec::new(),
            verifications: Vec::new(),
        }
    }

    pub fn with_plan(mut self, plan: DeploymentPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_registry(mut self, registry: RemediationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Drive the state machine to a terminal state and report.
    pub async fn run(mut self) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, steps = self.plan.len(), "Starting deployment run");

        let outcome = self.drive().await;

        match outcome {
            RunOutcome::Succeeded => info!(run_id = %run_id, "Deployment succeeded"),
            RunOutcome::Failed => error!(
                run_id = %run_id,
                diagnostics = self.diagnostics.len(),
                "Deployment failed"
            ),
        }

        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcome,
            states: self.states,
            steps: self.steps,
            remediations: self.remediations,
            verifications: self.verifications,
            ledger: self.ledger.applied().collect(),
            diagnostics: self.diagnostics,
        }
    }

    async fn drive(&mut self) -> RunOutcome {
        self.enter(DriverState::Planning);
        let steps = self.plan.steps().to_vec();

        self.enter(DriverState::Running);
        for step in &steps {
            if let Err(e) = self.run_step(step).await {
                error!(error = %e, "Aborting run");
                return self.finish(RunOutcome::Failed);
            }
        }

        self.enter(DriverState::Verifying);
        if self.verify().await {
            return self.finish(RunOutcome::Succeeded);
        }

        self.enter(DriverState::RemediatingFinal);
        warn!("Verification failed, resetting ledger for a comprehensive pass");
        self.ledger.clear();
        let record = self
            .registry
            .remediate(
                FixCategory::Comprehensive,
                &mut self.ledger,
                self.target.as_ref(),
                &mut self.diagnostics,
            )
            .await;
        self.remediations.push(record);

        self.enter(DriverState::VerifyingFinal);
        if self.verify().await {
            return self.finish(RunOutcome::Succeeded);
        }

        let summary = self
            .verifications
            .last()
            .map(VerificationResult::failure_summary)
            .unwrap_or_default();
        self.diagnostics.push(
            FailureKind::RemediationExhausted,
            format!(
                "still unhealthy after comprehensive remediation: {}",
                summary
            ),
        );
        self.finish(RunOutcome::Failed)
    }

    /// Execute a step; on failure classify, remediate, retry once, settle.
    async fn run_step(&mut self, step: &DeploymentStep) -> Result<()> {
        let first = self.sequencer.run_step(step).await;
        if first.success {
            self.steps.push(record(step, 1, &first, Vec::new()));
            return Ok(());
        }

        let signal = self.diagnose(step, &first).await;
        let categories = signal.actionable_categories();
        if signal.is_empty() {
            info!(step = %step.name, fallback = %FixCategory::FALLBACK, "No recognizable fault, using fallback category");
        } else {
            info!(step = %step.name, categories = ?categories, "Classified step failure");
        }

        for &category in &categories {
            let record = self
                .registry
                .remediate(
                    category,
                    &mut self.ledger,
                    self.target.as_ref(),
                    &mut self.diagnostics,
                )
                .await;
            self.remediations.push(record);
        }

        info!(step = %step.name, "Retrying step after remediation");
        let retry = self.sequencer.run_step(step).await;
        self.steps
            .push(record(step, 2, &retry, categories.clone()));

        if retry.success {
            self.diagnostics.push(
                FailureKind::StepRecovered,
                format!(
                    "step '{}' recovered after remediation [{}]",
                    step.name,
                    join(&categories)
                ),
            );
            return Ok(());
        }

        self.sequencer
            .settle_failure(step, &retry, &categories, &mut self.diagnostics)
    }

    /// Classify the step's own output plus recent logs of its component.
    async fn diagnose(&self, step: &DeploymentStep, outcome: &StepOutcome) -> DiagnosticSignal {
        let mut text = format!("{}\n{}", outcome.exit_info, outcome.output);

        if let Some(component) = &step.log_component {
            match self.target.read_logs(component, self.log_window).await {
                Ok(logs) => {
                    text.push('\n');
                    text.push_str(&logs);
                }
                Err(e) => {
                    debug!(component = %component, error = %e, "Could not read component logs")
                }
            }
        }

        self.classifier.diagnose(&text)
    }

    async fn verify(&mut self) -> bool {
        let result = self.verifier.verify(self.target.as_ref()).await;
        let passed = result.overall();
        if !passed {
            self.diagnostics.push(
                FailureKind::VerificationFailure,
                format!("verification failed: {}", result.failure_summary()),
            );
        }
        self.verifications.push(result);
        passed
    }

    fn enter(&mut self, state: DriverState) {
        debug!(state = state.as_str(), "Driver state");
        self.states.push(state);
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunOutcome {
        self.enter(outcome.state());
        outcome
    }
}

fn record(
    step: &DeploymentStep,
    attempts: u32,
    outcome: &StepOutcome,
    remediated: Vec<FixCategory>,
) -> StepRecord {
    StepRecord {
        name: step.name.clone(),
        critical: step.critical,
        attempts,
        success: outcome.success,
        exit_info: outcome.exit_info.clone(),
        remediated,
    }
}

fn join(categories: &[FixCategory]) -> String {
    categories
        .iter()
        .map(FixCategory::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::op::TargetOp;
    use doctor_target::fakes::FakeTarget;
    use doctor_target::ContainerOp;

    fn context() -> RunContext {
        let mut config = OrchestratorConfig::default();
        config.verify_attempts = 1;
        config.readiness_attempts = 1;
        config.poll_interval_secs = 0;
        config.context()
    }

    #[tokio::test]
    async fn test_clean_run_states() {
        let fake = Arc::new(FakeTarget::new());
        let report = Orchestrator::new(fake, &context()).run().await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(
            report.states,
            vec![
                DriverState::Planning,
                DriverState::Running,
                DriverState::Verifying,
                DriverState::Succeeded,
            ]
        );
        assert!(report.steps.iter().all(|s| s.success && s.attempts == 1));
        assert!(report.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_logs_feed_classification() {
        let fake = Arc::new(FakeTarget::new());
        fake.fail_container("up", 1, "exit status 1");
        fake.set_logs("maintenance-app", "sqlite3.OperationalError: unable to open database file");

        let report = Orchestrator::new(fake.clone(), &context()).run().await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        let start = report
            .steps
            .iter()
            .find(|s| s.name == "start containers")
            .unwrap();
        assert_eq!(start.attempts, 2);
        assert_eq!(start.remediated, vec![FixCategory::Database]);
        assert_eq!(report.diagnostics.of_kind(FailureKind::StepRecovered).count(), 1);
    }

    #[tokio::test]
    async fn test_soft_step_failure_continues() {
        let fake = Arc::new(FakeTarget::new());
        fake.fail_host("openssl", 2, "unable to write 'random state'");
        let plan = DeploymentPlan::new(vec![
            DeploymentStep::soft(
                "generate tls certificate",
                TargetOp::Host(doctor_target::CommandSpec::new(
                    "openssl",
                    ["req"],
                    Duration::from_secs(5),
                )),
            ),
            DeploymentStep::critical("build containers", TargetOp::Container(ContainerOp::Build)),
        ]);

        let report = Orchestrator::new(fake.clone(), &context())
            .with_plan(plan)
            .run()
            .await;

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(fake.container_count("build"), 1);
        assert_eq!(report.diagnostics.of_kind(FailureKind::SoftStepFailure).count(), 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Succeeded.exit_code(), 0);
        assert_eq!(RunOutcome::Failed.exit_code(), 1);
    }
}
