//! Docker + nginx implementation of [`TargetSystem`].
//!
//! Container operations shell out to the `docker` CLI (compose for stack-wide
//! verbs), health probes go through `reqwest`, and the proxy configuration is
//! rendered from the fixed template in [`crate::proxy`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::command::{run_command, CommandOutput, CommandSpec};
use crate::error::TargetError;
use crate::fs::apply_path_repair;
use crate::ops::{ContainerOp, PathRepair, ProbeResponse, ProxyParams};
use crate::proxy::render_proxy_config;
use crate::traits::TargetSystem;
use crate::Result;

/// Settings for [`DockerTarget`].
#[derive(Debug, Clone)]
pub struct DockerTargetConfig {
    /// Directory holding the compose project.
    pub project_dir: PathBuf,

    /// Compose file, relative to `project_dir` or absolute.
    pub compose_file: PathBuf,

    /// Budget for quick CLI calls (inspect, network, logs).
    pub command_timeout: Duration,

    /// Budget for container lifecycle calls (up, down, restart, exec).
    pub container_timeout: Duration,

    /// Budget for image builds.
    pub build_timeout: Duration,

    /// Budget for one HTTP health probe.
    pub probe_timeout: Duration,

    /// Accept self-signed certificates on probes through the proxy.
    pub accept_invalid_certs: bool,
}

impl Default for DockerTargetConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            compose_file: PathBuf::from("docker-compose.yml"),
            command_timeout: Duration::from_secs(15),
            container_timeout: Duration::from_secs(60),
            build_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(5),
            accept_invalid_certs: true,
        }
    }
}

/// Target system backed by the local Docker daemon.
pub struct DockerTarget {
    config: DockerTargetConfig,
    http_client: reqwest::Client,
}

impl DockerTarget {
    /// Create a target; fails only if the HTTP client cannot be built.
    pub fn new(config: DockerTargetConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("deploy-doctor/", env!("CARGO_PKG_VERSION")))
            .timeout(config.probe_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(DockerTarget {
            config,
            http_client,
        })
    }

    /// Settings this target was built with.
    pub fn config(&self) -> &DockerTargetConfig {
        &self.config
    }

    fn docker<I, S>(&self, args: I, timeout: Duration) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("docker", args, timeout).in_dir(&self.config.project_dir)
    }

    fn compose(&self, verb: &[&str], timeout: Duration) -> CommandSpec {
        let mut args = vec![
            "compose".to_string(),
            "--file".to_string(),
            self.config.compose_file.to_string_lossy().to_string(),
        ];
        args.extend(verb.iter().map(|s| s.to_string()));
        self.docker(args, timeout)
    }

    /// Translate a container operation into a docker CLI invocation.
    pub fn command_for(&self, op: &ContainerOp) -> CommandSpec {
        let short = self.config.command_timeout;
        let long = self.config.container_timeout;
        match op {
            ContainerOp::Build => self.compose(&["build"], self.config.build_timeout),
            ContainerOp::Up => self.compose(&["up", "-d"], long),
            ContainerOp::Down { remove_orphans } => {
                if *remove_orphans {
                    self.compose(&["down", "--remove-orphans"], long)
                } else {
                    self.compose(&["down"], long)
                }
            }
            ContainerOp::Restart { container } => {
                self.docker(["restart", container.as_str()], long)
            }
            ContainerOp::Remove { container } => {
                self.docker(["rm", "-f", container.as_str()], long)
            }
            ContainerOp::Inspect { container } => self.docker(
                ["inspect", "--format", "{{.State.Running}}", container.as_str()],
                short,
            ),
            ContainerOp::Exec { container, command } => {
                let mut args = vec!["exec".to_string(), container.clone()];
                args.extend(command.iter().cloned());
                self.docker(args, long)
            }
            ContainerOp::RunOnce {
                image,
                mounts,
                command,
            } => {
                let mut args = vec!["run".to_string(), "--rm".to_string()];
                for (host, inside) in mounts {
                    args.push("-v".to_string());
                    args.push(format!("{}:{}", host.display(), inside));
                }
                args.push(image.clone());
                args.extend(command.iter().cloned());
                self.docker(args, long)
            }
            ContainerOp::RemoveNetwork { name } => {
                self.docker(["network", "rm", name.as_str()], short)
            }
        }
    }
}

#[async_trait]
impl TargetSystem for DockerTarget {
    async fn run_container_operation(&self, op: &ContainerOp) -> Result<CommandOutput> {
        let spec = self.command_for(op);
        debug!(op = %op.label(), command = %spec.display(), "Container operation");
        run_command(&spec).await
    }

    async fn ensure_network(&self, name: &str) -> Result<bool> {
        let timeout = self.config.command_timeout;
        let inspect = run_command(&self.docker(["network", "inspect", name], timeout)).await?;
        if inspect.success {
            debug!(network = %name, "Reusing existing network");
            return Ok(true);
        }

        info!(network = %name, "Creating network");
        let create = run_command(&self.docker(["network", "create", name], timeout)).await?;
        if !create.success {
            warn!(network = %name, stderr = %create.stderr.trim(), "Network creation failed");
        }
        Ok(create.success)
    }

    async fn write_proxy_config(&self, params: &ProxyParams) -> Result<()> {
        let rendered = render_proxy_config(params);
        if let Some(parent) = params.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&params.output_path, rendered).await?;
        info!(path = %params.output_path.display(), "Proxy configuration written");
        Ok(())
    }

    async fn probe_health(&self, url: &str) -> Result<ProbeResponse> {
        match self.http_client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Ok(ProbeResponse {
                    success: status.is_success(),
                    status: Some(status.as_u16()),
                    body,
                })
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Health probe unreachable");
                Ok(ProbeResponse::unreachable(e.to_string()))
            }
        }
    }

    async fn read_logs(&self, component: &str, since: Duration) -> Result<String> {
        let since = format!("{}s", since.as_secs().max(1));
        let spec = self.docker(
            ["logs", "--since", since.as_str(), component],
            self.config.command_timeout,
        );
        // Failure text ("No such container") is still a useful signal.
        Ok(run_command(&spec).await?.combined())
    }

    async fn run_host_command(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        run_command(spec).await
    }

    async fn prepare_paths(&self, repair: &PathRepair) -> Result<()> {
        let repair = repair.clone();
        tokio::task::spawn_blocking(move || apply_path_repair(&repair))
            .await
            .map_err(|e| TargetError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    async fn path_exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}
