//! External command execution with explicit timeouts.

use crate::error::TargetError;
use crate::Result;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// A host command to run against the target machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Hard wall-clock budget for the command.
    pub timeout: Duration,

    /// Working directory (inherits the caller's when `None`).
    pub cwd: Option<PathBuf>,

    /// When this path already exists the command is considered done and is skipped.
    pub creates: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command with the given timeout.
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
            cwd: None,
            creates: None,
        }
    }

    /// Run the command from `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Skip the command when `path` exists.
    pub fn creates(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates = Some(path.into());
        self
    }

    /// Shell-like rendering for logs and narratives.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process exited successfully.
    pub success: bool,
}

impl CommandOutput {
    /// Successful output carrying `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 0,
            success: true,
        }
    }

    /// Failed output carrying `stderr`.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
            success: false,
        }
    }

    /// stdout and stderr joined, for log classification.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Execute a command, enforcing `spec.timeout`.
///
/// A non-zero exit is not an error: it comes back as a `CommandOutput`
/// with `success == false`. Errors are reserved for spawn failures and
/// timeouts.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput> {
    if spec.program.is_empty() {
        return Err(TargetError::EmptyCommand(spec.display()));
    }

    let start = Instant::now();
    debug!(command = %spec.display(), "Running command");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.cwd {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|source| TargetError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let output = tokio::time::timeout(spec.timeout, child.wait_with_output())
        .await
        .map_err(|_| TargetError::Timeout {
            program: spec.program.clone(),
            timeout: spec.timeout,
        })??;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        success: output.status.success(),
    })
}
