//! In-memory fake target system (testing only)
//!
//! `FakeTarget` records every call and answers from per-operation scripts.
//! Anything not scripted succeeds, so tests only describe the failures they
//! care about.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandSpec};
use crate::error::TargetError;
use crate::ops::{ContainerOp, PathRepair, ProbeResponse, ProxyParams};
use crate::traits::TargetSystem;
use crate::Result;

/// One recorded interaction with the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCall {
    Container(ContainerOp),
    EnsureNetwork(String),
    WriteProxyConfig(ProxyParams),
    Probe(String),
    ReadLogs(String),
    Host(CommandSpec),
    PreparePaths(PathRepair),
    PathExists(PathBuf),
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<TargetCall>,
    container_script: HashMap<String, VecDeque<CommandOutput>>,
    host_script: HashMap<String, VecDeque<CommandOutput>>,
    probe_script: HashMap<String, VecDeque<ProbeResponse>>,
    network_script: VecDeque<bool>,
    proxy_failures: usize,
    path_failures: usize,
    logs: HashMap<String, String>,
    stopped: HashSet<String>,
    absent: HashSet<String>,
    existing: HashSet<PathBuf>,
}

/// Scriptable [`TargetSystem`] that never touches the host.
#[derive(Debug)]
pub struct FakeTarget {
    health_body: String,
    state: Mutex<FakeState>,
}

impl Default for FakeTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTarget {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fake whose probes answer `{"status": "healthy"}`.
    pub fn new() -> Self {
        Self::with_health_body(r#"{"status": "healthy"}"#)
    }

    /// Fake whose successful probes answer `body`.
    pub fn with_health_body(body: impl Into<String>) -> Self {
        Self {
            health_body: body.into(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Queue responses for a container operation label (see [`ContainerOp::label`]).
    pub fn script_container<I>(&self, label: &str, outputs: I)
    where
        I: IntoIterator<Item = CommandOutput>,
    {
        let mut state = self.state();
        state
            .container_script
            .entry(label.to_string())
            .or_default()
            .extend(outputs);
    }

    /// Make the next `times` calls of `label` exit 1 with `stderr`.
    pub fn fail_container(&self, label: &str, times: usize, stderr: &str) {
        self.script_container(
            label,
            std::iter::repeat(CommandOutput::failed(1, stderr)).take(times),
        );
    }

    /// Make the next `times` host commands running `program` exit 1 with `stderr`.
    pub fn fail_host(&self, program: &str, times: usize, stderr: &str) {
        let mut state = self.state();
        state
            .host_script
            .entry(program.to_string())
            .or_default()
            .extend(std::iter::repeat(CommandOutput::failed(1, stderr)).take(times));
    }

    /// Make the next `times` probes of `url` fail with `body`.
    pub fn fail_probe(&self, url: &str, times: usize, body: &str) {
        let mut state = self.state();
        let failure = ProbeResponse {
            success: false,
            status: Some(502),
            body: body.to_string(),
        };
        state
            .probe_script
            .entry(url.to_string())
            .or_default()
            .extend(std::iter::repeat(failure).take(times));
    }

    /// Make the next `times` network ensures report failure.
    pub fn fail_network(&self, times: usize) {
        let mut state = self.state();
        state
            .network_script
            .extend(std::iter::repeat(false).take(times));
    }

    /// Make the next `times` proxy config writes fail.
    pub fn fail_proxy_writes(&self, times: usize) {
        self.state().proxy_failures += times;
    }

    /// Make the next `times` path repairs fail with permission denied.
    pub fn fail_path_repairs(&self, times: usize) {
        self.state().path_failures += times;
    }

    /// Text returned by `read_logs(component, _)`.
    pub fn set_logs(&self, component: &str, text: &str) {
        let mut state = self.state();
        state.logs.insert(component.to_string(), text.to_string());
    }

    /// Report `container` as not running on inspect.
    pub fn set_stopped(&self, container: &str) {
        let mut state = self.state();
        state.stopped.insert(container.to_string());
    }

    /// Treat `container` as not created yet: inspect, restart, exec and
    /// remove fail until the next `up`.
    pub fn set_absent(&self, container: &str) {
        let mut state = self.state();
        state.absent.insert(container.to_string());
    }

    /// Report `path` as existing on the host.
    pub fn set_existing(&self, path: impl Into<PathBuf>) {
        let mut state = self.state();
        state.existing.insert(path.into());
    }

    /// Report `container` as running again.
    pub fn set_running(&self, container: &str) {
        let mut state = self.state();
        state.stopped.remove(container);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<TargetCall> {
        self.state().calls.clone()
    }

    /// Number of container operations with this label.
    pub fn container_count(&self, label: &str) -> usize {
        self.count(|c| matches!(c, TargetCall::Container(op) if op.label() == label))
    }

    /// Number of `ensure_network` calls.
    pub fn network_count(&self) -> usize {
        self.count(|c| matches!(c, TargetCall::EnsureNetwork(_)))
    }

    /// Number of proxy configuration writes.
    pub fn proxy_write_count(&self) -> usize {
        self.count(|c| matches!(c, TargetCall::WriteProxyConfig(_)))
    }

    /// Number of probes of `url`.
    pub fn probe_count(&self, url: &str) -> usize {
        self.count(|c| matches!(c, TargetCall::Probe(u) if u == url))
    }

    /// Number of host commands running `program`.
    pub fn host_count(&self, program: &str) -> usize {
        self.count(|c| matches!(c, TargetCall::Host(spec) if spec.program == program))
    }

    /// Number of path repairs.
    pub fn path_repair_count(&self) -> usize {
        self.count(|c| matches!(c, TargetCall::PreparePaths(_)))
    }

    /// Number of calls matching `pred`.
    pub fn count<F>(&self, pred: F) -> usize
    where
        F: Fn(&TargetCall) -> bool,
    {
        self.state()
            .calls
            .iter()
            .filter(|c| pred(c))
            .count()
    }
}

#[async_trait]
impl TargetSystem for FakeTarget {
    async fn run_container_operation(&self, op: &ContainerOp) -> Result<CommandOutput> {
        let mut state = self.state();
        state.calls.push(TargetCall::Container(op.clone()));

        if let Some(scripted) = state
            .container_script
            .get_mut(&op.label())
            .and_then(VecDeque::pop_front)
        {
            return Ok(scripted);
        }

        let output = match op {
            ContainerOp::Inspect { container } if state.absent.contains(container) => {
                CommandOutput::failed(1, format!("Error: No such object: {}", container))
            }
            ContainerOp::Inspect { container } => {
                CommandOutput::ok((!state.stopped.contains(container)).to_string())
            }
            ContainerOp::Restart { container }
            | ContainerOp::Exec { container, .. }
            | ContainerOp::Remove { container }
                if state.absent.contains(container) =>
            {
                CommandOutput::failed(
                    1,
                    format!("Error response from daemon: No such container: {}", container),
                )
            }
            ContainerOp::Remove { container } => {
                state.absent.insert(container.clone());
                CommandOutput::ok("")
            }
            ContainerOp::Up => {
                state.absent.clear();
                CommandOutput::ok("")
            }
            _ => CommandOutput::ok(""),
        };
        Ok(output)
    }

    async fn ensure_network(&self, name: &str) -> Result<bool> {
        let mut state = self.state();
        state.calls.push(TargetCall::EnsureNetwork(name.to_string()));
        Ok(state.network_script.pop_front().unwrap_or(true))
    }

    async fn write_proxy_config(&self, params: &ProxyParams) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TargetCall::WriteProxyConfig(params.clone()));
        if state.proxy_failures > 0 {
            state.proxy_failures -= 1;
            return Err(TargetError::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "permission denied writing proxy config",
            )));
        }
        Ok(())
    }

    async fn probe_health(&self, url: &str) -> Result<ProbeResponse> {
        let mut state = self.state();
        state.calls.push(TargetCall::Probe(url.to_string()));
        let scripted = state
            .probe_script
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| ProbeResponse::ok(self.health_body.clone())))
    }

    async fn read_logs(&self, component: &str, _since: Duration) -> Result<String> {
        let mut state = self.state();
        state.calls.push(TargetCall::ReadLogs(component.to_string()));
        Ok(state.logs.get(component).cloned().unwrap_or_default())
    }

    async fn run_host_command(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut state = self.state();
        state.calls.push(TargetCall::Host(spec.clone()));
        let scripted = state
            .host_script
            .get_mut(&spec.program)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| CommandOutput::ok("")))
    }

    async fn prepare_paths(&self, repair: &PathRepair) -> Result<()> {
        let mut state = self.state();
        state.calls.push(TargetCall::PreparePaths(repair.clone()));
        if state.path_failures > 0 {
            state.path_failures -= 1;
            return Err(TargetError::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "permission denied",
            )));
        }
        Ok(())
    }

    async fn path_exists(&self, path: &Path) -> Result<bool> {
        let mut state = self.state();
        state.calls.push(TargetCall::PathExists(path.to_path_buf()));
        Ok(state.existing.contains(path))
    }
}
