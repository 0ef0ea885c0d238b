//! deploy-doctor core: a self-healing deployment orchestrator.
//!
//! - [`plan`]: the fixed, ordered deployment steps
//! - [`sequencer`]: runs one step and applies its failure policy
//! - [`classifier`]: maps log text to fault categories
//! - [`remediation`]: tiered, idempotent repair routines per category
//! - [`verifier`]: post-deployment liveness and health checks
//! - [`driver`]: the state machine tying them together
//! - [`diagnostics`]: the narrative shown to the operator at the end
//!
//! Everything talks to the deployed system through
//! [`doctor_target::TargetSystem`].

pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod driver;
pub mod ledger;
pub mod lock;
pub mod op;
pub mod plan;
pub mod poll;
pub mod remediation;
pub mod report;
pub mod sequencer;
pub mod telemetry;
pub mod verifier;

pub use classifier::{classify, ClassifierRule, DiagnosticSignal, FaultClassifier, Pattern};
pub use config::{OrchestratorConfig, RunContext};
pub use diagnostics::{DiagnosticLog, FailureKind, Narrative};
pub use domain::{
    CheckResult, DeploymentStep, DoctorError, FixCategory, Result, StepOutcome, StepRecord,
    VerificationResult,
};
pub use driver::{DriverState, Orchestrator, RunOutcome};
pub use ledger::AppliedFixLedger;
pub use lock::RunLock;
pub use op::{execute_op, OpOutcome, TargetOp};
pub use plan::DeploymentPlan;
pub use poll::{poll_until, PollPolicy, Polled};
pub use remediation::{
    RemediationPlan, RemediationRecord, RemediationRegistry, RemediationResolution,
    RemediationTier,
};
pub use report::{read_run_report, write_run_report, RunReport};
pub use sequencer::StepSequencer;
pub use telemetry::init_tracing;
pub use verifier::Verifier;
