//! The declarative, ordered deployment plan.

use doctor_target::{CommandSpec, ContainerOp, PathRepair};
use std::time::Duration;

use crate::config::RunContext;
use crate::domain::DeploymentStep;
use crate::op::TargetOp;

/// Certificates take a while on slow hosts.
const TLS_TIMEOUT: Duration = Duration::from_secs(60);

/// Ordered steps; order encodes dependencies (network before proxy config,
/// database file before containers start).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeploymentPlan {
    steps: Vec<DeploymentStep>,
}

impl DeploymentPlan {
    pub fn new(steps: Vec<DeploymentStep>) -> Self {
        Self { steps }
    }

    /// The standard plan for the containerised web stack.
    pub fn standard(ctx: &RunContext) -> Self {
        let cert = ctx.certificate_path();
        let key = ctx.certificate_key_path();
        let subject = format!("/CN={}", ctx.server_name);

        let openssl = CommandSpec::new(
            "openssl",
            [
                "req".to_string(),
                "-x509".to_string(),
                "-nodes".to_string(),
                "-newkey".to_string(),
                "rsa:2048".to_string(),
                "-days".to_string(),
                "365".to_string(),
                "-keyout".to_string(),
                key.to_string_lossy().to_string(),
                "-out".to_string(),
                cert.to_string_lossy().to_string(),
                "-subj".to_string(),
                subject,
            ],
            TLS_TIMEOUT,
        )
        .creates(&cert);

        let proxy_dir = ctx
            .proxy_config_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| ctx.data_dir.clone());

        Self::new(vec![
            DeploymentStep::critical(
                "check prerequisites",
                TargetOp::Host(CommandSpec::new(
                    "docker",
                    ["--version"],
                    ctx.command_timeout,
                )),
            ),
            DeploymentStep::critical(
                "prepare data directory",
                TargetOp::PreparePaths(PathRepair {
                    dirs: vec![
                        ctx.data_dir.clone(),
                        ctx.templates_dir.clone(),
                        ctx.ssl_dir.clone(),
                        proxy_dir,
                    ],
                    mode: Some(0o775),
                    ..Default::default()
                }),
            ),
            DeploymentStep::critical(
                "create network",
                TargetOp::EnsureNetwork {
                    name: ctx.network_name.clone(),
                },
            ),
            DeploymentStep::soft("generate tls certificate", TargetOp::Host(openssl)),
            DeploymentStep::critical(
                "write proxy config",
                TargetOp::WriteProxyConfig(ctx.proxy_params()),
            ),
            DeploymentStep::soft(
                "initialize database",
                TargetOp::PreparePaths(PathRepair {
                    files: vec![ctx.db_path.clone()],
                    mode: Some(0o664),
                    ..Default::default()
                }),
            ),
            DeploymentStep::critical("build containers", TargetOp::Container(ContainerOp::Build)),
            DeploymentStep::critical("start containers", TargetOp::Container(ContainerOp::Up))
                .with_logs_from(&ctx.app_container),
            DeploymentStep::soft(
                "wait for readiness",
                TargetOp::WaitForHealth {
                    url: ctx.app_health_url.clone(),
                    marker: ctx.health_marker.clone(),
                    policy: ctx.readiness,
                },
            )
            .with_logs_from(&ctx.app_container),
        ])
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}
