//! The collaborator interface the orchestrator drives.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::command::{CommandOutput, CommandSpec};
use crate::ops::{ContainerOp, PathRepair, ProbeResponse, ProxyParams};
use crate::Result;

/// Everything the orchestrator may do to the managed system.
///
/// Implementations must be idempotent where the method name says so
/// (`ensure_network`) and must enforce their own timeouts: callers await
/// each method sequentially and never race two calls.
#[async_trait]
pub trait TargetSystem: Send + Sync {
    /// Start/stop/build/inspect the managed container group.
    async fn run_container_operation(&self, op: &ContainerOp) -> Result<CommandOutput>;

    /// Create the network if missing; `true` when it exists afterwards.
    async fn ensure_network(&self, name: &str) -> Result<bool>;

    /// Regenerate reverse-proxy configuration from the fixed template.
    async fn write_proxy_config(&self, params: &ProxyParams) -> Result<()>;

    /// HTTP GET with a short timeout.
    async fn probe_health(&self, url: &str) -> Result<ProbeResponse>;

    /// Recent log output of one component.
    async fn read_logs(&self, component: &str, since: Duration) -> Result<String>;

    /// Run a host-side helper command.
    async fn run_host_command(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Back up, create and chmod host paths.
    async fn prepare_paths(&self, repair: &PathRepair) -> Result<()>;

    /// Whether `path` exists on the host the stack runs on.
    async fn path_exists(&self, path: &Path) -> Result<bool>;
}
