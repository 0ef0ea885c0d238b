//! Post-deployment health verification.

use doctor_target::{ContainerOp, TargetSystem};
use tracing::{info, warn};

use crate::config::RunContext;
use crate::domain::{CheckResult, VerificationResult};
use crate::op::wait_for_health;
use crate::poll::PollPolicy;

/// Fixed battery of liveness and health checks.
///
/// Checks are independent; their order only shapes the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier {
    pub app_container: String,
    pub proxy_container: String,
    pub app_health_url: String,
    pub proxy_health_url: String,
    pub marker: String,
    pub poll: PollPolicy,
}

impl Verifier {
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            app_container: ctx.app_container.clone(),
            proxy_container: ctx.proxy_container.clone(),
            app_health_url: ctx.app_health_url.clone(),
            proxy_health_url: ctx.proxy_health_url.clone(),
            marker: ctx.health_marker.clone(),
            poll: ctx.verify_poll,
        }
    }

    /// Run every check and AND the results.
    pub async fn verify(&self, target: &dyn TargetSystem) -> VerificationResult {
        let checks = vec![
            self.check_running(target, "app_running", &self.app_container)
                .await,
            self.check_running(target, "proxy_running", &self.proxy_container)
                .await,
            self.check_health(target, "app_health", &self.app_health_url)
                .await,
            self.check_health(target, "proxy_health", &self.proxy_health_url)
                .await,
        ];

        let result = VerificationResult::from_checks(checks);
        if result.overall() {
            info!("Verification passed");
        } else {
            warn!(failed = %result.failure_summary(), "Verification failed");
        }
        result
    }

    async fn check_running(
        &self,
        target: &dyn TargetSystem,
        name: &str,
        container: &str,
    ) -> CheckResult {
        let op = ContainerOp::Inspect {
            container: container.to_string(),
        };
        match target.run_container_operation(&op).await {
            Ok(out) if out.success && out.stdout.trim() == "true" => {
                CheckResult::pass(name, format!("{} is running", container))
            }
            Ok(out) if out.success => CheckResult::fail(
                name,
                format!("{} is not running (state: {})", container, out.stdout.trim()),
            ),
            Ok(out) => CheckResult::fail(
                name,
                format!("cannot inspect {}: {}", container, out.combined().trim()),
            ),
            Err(e) => CheckResult::fail(name, format!("cannot inspect {}: {}", container, e)),
        }
    }

    async fn check_health(&self, target: &dyn TargetSystem, name: &str, url: &str) -> CheckResult {
        let outcome = wait_for_health(target, url, &self.marker, &self.poll).await;
        if outcome.success {
            CheckResult::pass(name, format!("{} {}", url, outcome.exit_info))
        } else {
            CheckResult::fail(
                name,
                format!("{} {} ({})", url, outcome.exit_info, outcome.output),
            )
        }
    }
}
