use std::sync::Arc;
use std::time::Duration;

use doctor_core::{
    DeploymentPlan, DeploymentStep, DriverState, FailureKind, FixCategory, Orchestrator,
    OrchestratorConfig, RemediationRegistry, RemediationTier, RunContext, RunOutcome, TargetOp,
};
use doctor_target::fakes::{FakeTarget, TargetCall};
use doctor_target::{CommandSpec, ContainerOp};

fn context() -> RunContext {
    let mut config = OrchestratorConfig::default();
    config.data_dir = "/nonexistent/deploy-doctor-test".into();
    config.verify_attempts = 1;
    config.readiness_attempts = 1;
    config.poll_interval_secs = 0;
    config.context()
}

#[tokio::test]
async fn critical_step_failing_twice_aborts_with_one_narrative() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_container("build", 2, "failed to solve: process did not complete successfully");

    let report = Orchestrator::new(fake.clone(), &context()).run().await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.diagnostics.len(), 1);

    let entry = &report.diagnostics.entries()[0];
    assert_eq!(entry.kind, FailureKind::CriticalStepFailure);
    assert!(entry.message.contains("build containers"));
    assert!(entry.message.contains("network"));

    // Nothing after the failed step ran, and nothing was verified.
    assert_eq!(fake.container_count("up"), 0);
    assert!(report.verifications.is_empty());
    assert_eq!(
        report.states,
        vec![DriverState::Planning, DriverState::Running, DriverState::Failed]
    );
}

#[tokio::test]
async fn failed_verification_recovers_through_comprehensive_pass() {
    let ctx = context();
    let fake = Arc::new(FakeTarget::new());
    fake.fail_probe(&ctx.proxy_health_url, 1, "502 Bad Gateway");

    let report = Orchestrator::new(fake.clone(), &ctx).run().await;

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(
        report.states,
        vec![
            DriverState::Planning,
            DriverState::Running,
            DriverState::Verifying,
            DriverState::RemediatingFinal,
            DriverState::VerifyingFinal,
            DriverState::Succeeded,
        ]
    );
    assert_eq!(report.verifications.len(), 2);
    assert!(!report.verifications[0].overall());
    assert!(report.verifications[1].overall());

    let last = report.remediations.last().unwrap();
    assert_eq!(last.category, FixCategory::Comprehensive);
    assert_eq!(fake.container_count("down"), 1);
    assert_eq!(fake.probe_count(&ctx.proxy_health_url), 2);
    assert_eq!(
        report.ledger,
        FixCategory::ALL.to_vec(),
        "comprehensive pass marks every category"
    );
    assert_eq!(
        report.diagnostics.of_kind(FailureKind::VerificationFailure).count(),
        1
    );
}

#[tokio::test]
async fn persistent_unhealthiness_fails_after_one_final_pass() {
    let ctx = context();
    let fake = Arc::new(FakeTarget::new());
    fake.set_stopped(&ctx.proxy_container);

    let report = Orchestrator::new(fake.clone(), &ctx).run().await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.verifications.len(), 2);
    assert_eq!(*report.states.last().unwrap(), DriverState::Failed);
    assert_eq!(
        report
            .remediations
            .iter()
            .filter(|r| r.category == FixCategory::Comprehensive)
            .count(),
        1
    );
    assert_eq!(
        report.diagnostics.of_kind(FailureKind::RemediationExhausted).count(),
        1
    );
}

#[tokio::test]
async fn unclassified_failure_falls_back_to_network() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_container("build", 1, "something odd happened");

    let report = Orchestrator::new(fake.clone(), &context()).run().await;

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    let build = report
        .steps
        .iter()
        .find(|s| s.name == "build containers")
        .unwrap();
    assert_eq!(build.remediated, vec![FixCategory::Network]);
    assert_eq!(fake.container_count("restart:maintenance-app"), 1);
}

#[tokio::test]
async fn multi_category_failure_remediates_each_category_once() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_container(
        "up",
        1,
        "Connection refused to database at sqlite path",
    );

    let report = Orchestrator::new(fake.clone(), &context()).run().await;

    let start = report
        .steps
        .iter()
        .find(|s| s.name == "start containers")
        .unwrap();
    assert_eq!(
        start.remediated,
        vec![FixCategory::Network, FixCategory::Database]
    );
    assert_eq!(fake.container_count("exec:maintenance-app"), 1);
    assert_eq!(report.outcome, RunOutcome::Succeeded);
}

#[tokio::test]
async fn category_is_not_remediated_twice_across_steps() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_container("build", 1, "network unreachable");
    fake.fail_container("up", 1, "network unreachable");

    let report = Orchestrator::new(fake.clone(), &context()).run().await;

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    // One primary network fix for both failures.
    assert_eq!(fake.container_count("restart:maintenance-app"), 1);
    assert_eq!(
        report.diagnostics.of_kind(FailureKind::StepRecovered).count(),
        2
    );
}

#[tokio::test]
async fn soft_failure_keeps_later_steps_running() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_host("openssl", 2, "req: unable to load config");
    let plan = DeploymentPlan::new(vec![
        DeploymentStep::soft(
            "generate tls certificate",
            TargetOp::Host(CommandSpec::new("openssl", ["req"], Duration::from_secs(5))),
        ),
        DeploymentStep::critical("start containers", TargetOp::Container(ContainerOp::Up)),
    ]);

    let report = Orchestrator::new(fake.clone(), &context())
        .with_plan(plan)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(fake.container_count("up"), 1);
    assert_eq!(
        report.diagnostics.of_kind(FailureKind::SoftStepFailure).count(),
        1
    );
    assert!(report.steps[0].attempts == 2 && !report.steps[0].success);
}

#[tokio::test]
async fn start_failure_reads_application_logs() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_container("up", 1, "container exited with code 1");

    Orchestrator::new(fake.clone(), &context()).run().await;

    let reads = fake.count(|call| matches!(call, TargetCall::ReadLogs(c) if c == "maintenance-app"));
    assert_eq!(reads, 1);
}

#[tokio::test]
async fn network_fix_before_first_deploy_keeps_step_order() {
    let ctx = context();
    let fake = Arc::new(FakeTarget::new());
    fake.set_absent(&ctx.app_container);
    fake.set_absent(&ctx.proxy_container);
    fake.fail_network(1);

    let report = Orchestrator::new(fake.clone(), &ctx).run().await;

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    let network = report
        .remediations
        .iter()
        .find(|r| r.category == FixCategory::Network)
        .unwrap();
    assert_eq!(network.tier(), Some(RemediationTier::Primary));
    assert_eq!(fake.container_count(&format!("restart:{}", ctx.app_container)), 0);

    let calls = fake.calls();
    let position = |op: ContainerOp| {
        calls
            .iter()
            .position(|c| *c == TargetCall::Container(op.clone()))
            .unwrap()
    };
    assert!(position(ContainerOp::Build) < position(ContainerOp::Up));
    let certificate = calls
        .iter()
        .position(|c| matches!(c, TargetCall::Host(spec) if spec.program == "openssl"))
        .unwrap();
    assert!(certificate < position(ContainerOp::Up));
}

#[tokio::test]
async fn empty_registry_records_missing_routine_and_still_retries() {
    let fake = Arc::new(FakeTarget::new());
    fake.fail_container("build", 1, "network unreachable");

    let report = Orchestrator::new(fake.clone(), &context())
        .with_registry(RemediationRegistry::new())
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert!(report.ledger.is_empty());
    assert_eq!(fake.container_count("build"), 2);
    assert_eq!(
        report
            .diagnostics
            .of_kind(FailureKind::RemediationUnavailable)
            .count(),
        1
    );
    assert_eq!(
        report.diagnostics.of_kind(FailureKind::StepRecovered).count(),
        1
    );
}
