//! Target operations shared by deployment steps and remediation routines.

use doctor_target::{CommandOutput, CommandSpec, ContainerOp, PathRepair, ProxyParams, TargetSystem};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::debug;

use crate::poll::{poll_until, PollPolicy};

/// A single action against the target system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOp {
    /// Host-side helper command.
    Host(CommandSpec),

    /// Container group operation.
    Container(ContainerOp),

    /// Idempotent network create-or-reuse.
    EnsureNetwork { name: String },

    /// Re-render the reverse-proxy configuration.
    WriteProxyConfig(ProxyParams),

    /// Back up, create or chmod host paths.
    PreparePaths(PathRepair),

    /// Run `then` when `container` has been created (running or stopped),
    /// `otherwise` when it has not. The chosen branch stops at its first
    /// failure.
    IfDeployed {
        container: String,
        then: Vec<TargetOp>,
        otherwise: Vec<TargetOp>,
    },

    /// Poll a health URL until its body contains `marker`.
    WaitForHealth {
        url: String,
        marker: String,
        policy: PollPolicy,
    },
}

impl TargetOp {
    /// Human-readable one-liner for logs and narratives.
    pub fn describe(&self) -> String {
        match self {
            TargetOp::Host(spec) => spec.display(),
            TargetOp::Container(op) => format!("container {}", op.label()),
            TargetOp::EnsureNetwork { name } => format!("ensure network {}", name),
            TargetOp::WriteProxyConfig(params) => {
                format!("write proxy config {}", params.output_path.display())
            }
            TargetOp::PreparePaths(repair) => format!(
                "prepare {} path(s)",
                repair.dirs.len() + repair.files.len() + repair.backup.len()
            ),
            TargetOp::IfDeployed { container, .. } => format!("if {} deployed", container),
            TargetOp::WaitForHealth { url, .. } => format!("wait for {}", url),
        }
    }
}

/// Outcome of one [`TargetOp`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpOutcome {
    pub success: bool,
    pub exit_info: String,
    pub output: String,
    pub duration_ms: u64,
}

impl OpOutcome {
    fn ok(exit_info: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_info: exit_info.into(),
            ..Default::default()
        }
    }

    fn failed(exit_info: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_info: exit_info.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    fn from_command(out: CommandOutput) -> Self {
        Self {
            success: out.success,
            exit_info: format!("exit {}", out.exit_code),
            output: out.combined(),
            duration_ms: out.duration_ms,
        }
    }
}

/// Execute `op` against `target`.
///
/// Transport errors (spawn failure, timeout) become failed outcomes whose
/// output is the error text, so they can be classified like any other
/// failure.
pub async fn execute_op(target: &dyn TargetSystem, op: &TargetOp) -> OpOutcome {
    let start = Instant::now();
    debug!(op = %op.describe(), "Executing target operation");

    let mut outcome = match op {
        TargetOp::Host(spec) => match &spec.creates {
            Some(path) if matches!(target.path_exists(path).await, Ok(true)) => {
                OpOutcome::ok(format!("skipped, {} exists", path.display()))
            }
            _ => match target.run_host_command(spec).await {
                Ok(out) => OpOutcome::from_command(out),
                Err(e) => OpOutcome::failed(e.to_string(), e.to_string()),
            },
        },
        TargetOp::Container(container_op) => {
            match target.run_container_operation(container_op).await {
                Ok(out) => OpOutcome::from_command(out),
                Err(e) => OpOutcome::failed(e.to_string(), e.to_string()),
            }
        }
        TargetOp::EnsureNetwork { name } => match target.ensure_network(name).await {
            Ok(true) => OpOutcome::ok("network ready"),
            Ok(false) => OpOutcome::failed(
                "network unavailable",
                format!("network {} could not be created", name),
            ),
            Err(e) => OpOutcome::failed(e.to_string(), e.to_string()),
        },
        TargetOp::WriteProxyConfig(params) => match target.write_proxy_config(params).await {
            Ok(()) => OpOutcome::ok("proxy config written"),
            Err(e) => OpOutcome::failed(e.to_string(), format!("nginx config: {}", e)),
        },
        TargetOp::PreparePaths(repair) => match target.prepare_paths(repair).await {
            Ok(()) => OpOutcome::ok("paths ready"),
            Err(e) => OpOutcome::failed(e.to_string(), e.to_string()),
        },
        TargetOp::WaitForHealth {
            url,
            marker,
            policy,
        } => wait_for_health(target, url, marker, policy).await,
        TargetOp::IfDeployed {
            container,
            then,
            otherwise,
        } => {
            let deployed = is_deployed(target, container).await;
            let branch = if deployed { then } else { otherwise };
            let idle = if deployed {
                format!("{} deployed", container)
            } else {
                format!("skipped, {} not deployed", container)
            };
            execute_sequence(target, branch, idle).await
        }
    };

    outcome.duration_ms = outcome
        .duration_ms
        .max(start.elapsed().as_millis() as u64);
    outcome
}

/// Run `ops` in order, stopping at the first failure. `idle` is the
/// outcome when there is nothing to run.
fn execute_sequence<'a>(
    target: &'a dyn TargetSystem,
    ops: &'a [TargetOp],
    idle: String,
) -> Pin<Box<dyn Future<Output = OpOutcome> + Send + 'a>> {
    Box::pin(async move {
        let mut last = OpOutcome::ok(idle);
        for op in ops {
            last = execute_op(target, op).await;
            if !last.success {
                break;
            }
        }
        last
    })
}

/// Whether `container` exists, judged by a successful inspect.
pub(crate) async fn is_deployed(target: &dyn TargetSystem, container: &str) -> bool {
    let inspect = ContainerOp::Inspect {
        container: container.to_string(),
    };
    matches!(
        target.run_container_operation(&inspect).await,
        Ok(out) if out.success
    )
}

/// Probe `url` under `policy` until the body contains `marker`.
pub(crate) async fn wait_for_health(
    target: &dyn TargetSystem,
    url: &str,
    marker: &str,
    policy: &PollPolicy,
) -> OpOutcome {
    let polled = poll_until(policy, |_| async move {
        match target.probe_health(url).await {
            Ok(resp) if resp.success && resp.body.contains(marker) => Ok(resp),
            Ok(resp) => Err(match resp.status {
                Some(status) => format!("HTTP {}: {}", status, resp.body.trim()),
                None => format!("connection failed: {}", resp.body.trim()),
            }),
            Err(e) => Err(e.to_string()),
        }
    })
    .await;

    match polled {
        Ok(ready) => OpOutcome::ok(format!("healthy after {} attempt(s)", ready.attempts)),
        Err(last) => OpOutcome::failed(
            format!("not healthy after {} attempt(s)", last.attempts),
            last.value,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctor_target::fakes::FakeTarget;
    use std::time::Duration;

    #[tokio::test]
    async fn test_container_failure_carries_output() {
        let fake = FakeTarget::new();
        fake.fail_container("build", 1, "permission denied while trying to connect");
        let outcome = execute_op(&fake, &TargetOp::Container(ContainerOp::Build)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.exit_info, "exit 1");
        assert!(outcome.output.contains("permission denied"));
    }

    #[tokio::test]
    async fn test_host_command_skipped_when_created_path_exists() {
        let cert = std::path::PathBuf::from("/srv/data/ssl/cert.pem");
        let fake = FakeTarget::new();
        fake.set_existing(&cert);
        let spec = CommandSpec::new("openssl", ["req"], Duration::from_secs(30)).creates(&cert);
        let outcome = execute_op(&fake, &TargetOp::Host(spec)).await;

        assert!(outcome.success);
        assert!(outcome.exit_info.starts_with("skipped"));
        assert_eq!(fake.host_count("openssl"), 0);
    }

    #[tokio::test]
    async fn test_host_command_runs_when_created_path_missing() {
        let fake = FakeTarget::new();
        let spec = CommandSpec::new("openssl", ["req"], Duration::from_secs(30))
            .creates("/srv/data/ssl/cert.pem");
        let outcome = execute_op(&fake, &TargetOp::Host(spec)).await;

        assert!(outcome.success);
        assert_eq!(fake.host_count("openssl"), 1);
    }

    #[tokio::test]
    async fn test_if_deployed_picks_branch() {
        let fake = FakeTarget::new();
        fake.set_absent("app");
        let op = TargetOp::IfDeployed {
            container: "app".to_string(),
            then: vec![TargetOp::Container(ContainerOp::Restart {
                container: "app".to_string(),
            })],
            otherwise: vec![],
        };

        let outcome = execute_op(&fake, &op).await;
        assert!(outcome.success);
        assert_eq!(outcome.exit_info, "skipped, app not deployed");
        assert_eq!(fake.container_count("restart:app"), 0);

        fake.run_container_operation(&ContainerOp::Up).await.unwrap();
        let outcome = execute_op(&fake, &op).await;
        assert!(outcome.success);
        assert_eq!(fake.container_count("restart:app"), 1);
    }

    #[tokio::test]
    async fn test_if_deployed_stops_at_first_failure() {
        let fake = FakeTarget::new();
        fake.fail_container("down", 1, "daemon unavailable");
        let op = TargetOp::IfDeployed {
            container: "app".to_string(),
            then: vec![
                TargetOp::Container(ContainerOp::Down {
                    remove_orphans: false,
                }),
                TargetOp::Container(ContainerOp::Up),
            ],
            otherwise: vec![],
        };

        let outcome = execute_op(&fake, &op).await;
        assert!(!outcome.success);
        assert!(outcome.output.contains("daemon unavailable"));
        assert_eq!(fake.container_count("up"), 0);
    }

    #[tokio::test]
    async fn test_network_false_is_failure() {
        let fake = FakeTarget::new();
        fake.fail_network(1);
        let op = TargetOp::EnsureNetwork {
            name: "app-net".to_string(),
        };
        let outcome = execute_op(&fake, &op).await;
        assert!(!outcome.success);
        assert!(outcome.output.contains("network app-net"));
    }

    #[tokio::test]
    async fn test_proxy_write_failure_mentions_nginx() {
        let fake = FakeTarget::new();
        fake.fail_proxy_writes(1);
        let op = TargetOp::WriteProxyConfig(ProxyParams {
            server_name: "localhost".to_string(),
            listen_port: 443,
            upstream_host: "app".to_string(),
            upstream_port: 5000,
            certificate: "c".to_string(),
            certificate_key: "k".to_string(),
            output_path: "/tmp/default.conf".into(),
        });
        let outcome = execute_op(&fake, &op).await;
        assert!(!outcome.success);
        assert!(outcome.output.starts_with("nginx config"));
    }

    #[tokio::test]
    async fn test_wait_for_health_requires_marker() {
        let fake = FakeTarget::with_health_body("OK");
        let op = TargetOp::WaitForHealth {
            url: "http://127.0.0.1:5000/health".to_string(),
            marker: "healthy".to_string(),
            policy: PollPolicy::new(Duration::ZERO, 3),
        };
        let outcome = execute_op(&fake, &op).await;
        assert!(!outcome.success);
        assert_eq!(fake.probe_count("http://127.0.0.1:5000/health"), 3);
        assert_eq!(outcome.exit_info, "not healthy after 3 attempt(s)");
    }

    #[tokio::test]
    async fn test_wait_for_health_recovers() {
        let fake = FakeTarget::new();
        let url = "http://127.0.0.1:5000/health";
        fake.fail_probe(url, 2, "starting");
        let op = TargetOp::WaitForHealth {
            url: url.to_string(),
            marker: "healthy".to_string(),
            policy: PollPolicy::new(Duration::ZERO, 5),
        };
        let outcome = execute_op(&fake, &op).await;
        assert!(outcome.success);
        assert_eq!(outcome.exit_info, "healthy after 3 attempt(s)");
    }

    #[test]
    fn test_describe() {
        let op = TargetOp::EnsureNetwork {
            name: "app-net".to_string(),
        };
        assert_eq!(op.describe(), "ensure network app-net");
        assert_eq!(
            TargetOp::Container(ContainerOp::Up).describe(),
            "container up"
        );
    }
}
