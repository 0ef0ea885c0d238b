//! Operation vocabulary understood by every [`TargetSystem`](crate::TargetSystem).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Operation on the managed container group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerOp {
    /// Build all images of the stack.
    Build,

    /// Start the whole stack detached.
    Up,

    /// Stop and remove the stack.
    Down { remove_orphans: bool },

    /// Restart one container.
    Restart { container: String },

    /// Force-remove one container.
    Remove { container: String },

    /// Ask whether a container is running. Success with stdout `true` means running.
    Inspect { container: String },

    /// Run a command inside a running container.
    Exec {
        container: String,
        command: Vec<String>,
    },

    /// Run a throwaway helper container with host paths mounted.
    RunOnce {
        image: String,
        mounts: Vec<(PathBuf, String)>,
        command: Vec<String>,
    },

    /// Delete a container network.
    RemoveNetwork { name: String },
}

impl ContainerOp {
    /// Short verb for the operation.
    pub fn action(&self) -> &'static str {
        match self {
            ContainerOp::Build => "build",
            ContainerOp::Up => "up",
            ContainerOp::Down { .. } => "down",
            ContainerOp::Restart { .. } => "restart",
            ContainerOp::Remove { .. } => "remove",
            ContainerOp::Inspect { .. } => "inspect",
            ContainerOp::Exec { .. } => "exec",
            ContainerOp::RunOnce { .. } => "run",
            ContainerOp::RemoveNetwork { .. } => "network-rm",
        }
    }

    /// `action` plus the object it applies to, e.g. `restart:app`.
    pub fn label(&self) -> String {
        match self {
            ContainerOp::Build | ContainerOp::Up | ContainerOp::Down { .. } => {
                self.action().to_string()
            }
            ContainerOp::Restart { container }
            | ContainerOp::Remove { container }
            | ContainerOp::Inspect { container }
            | ContainerOp::Exec { container, .. } => format!("{}:{}", self.action(), container),
            ContainerOp::RunOnce { image, .. } => format!("{}:{}", self.action(), image),
            ContainerOp::RemoveNetwork { name } => format!("{}:{}", self.action(), name),
        }
    }
}

/// Parameters rendered into the reverse-proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyParams {
    /// `server_name` for the virtual host.
    pub server_name: String,

    /// Port the proxy listens on for TLS traffic.
    pub listen_port: u16,

    /// Hostname of the upstream application on the container network.
    pub upstream_host: String,

    /// Port the upstream application listens on.
    pub upstream_port: u16,

    /// Certificate path as seen from inside the proxy container.
    pub certificate: String,

    /// Private key path as seen from inside the proxy container.
    pub certificate_key: String,

    /// Where the rendered configuration is written on the host.
    pub output_path: PathBuf,
}

/// Result of one HTTP health probe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeResponse {
    /// Whether a 2xx response arrived within the probe timeout.
    pub success: bool,

    /// HTTP status, if any response arrived.
    pub status: Option<u16>,

    /// Response body, or the transport error text when no response arrived.
    pub body: String,
}

impl ProbeResponse {
    /// 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            success: true,
            status: Some(200),
            body: body.into(),
        }
    }

    /// Transport-level failure described by `reason`.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            body: reason.into(),
        }
    }
}

/// Host filesystem repair: back up, create and chmod paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathRepair {
    /// Directories to create (with parents).
    pub dirs: Vec<PathBuf>,

    /// Files to create empty if missing.
    pub files: Vec<PathBuf>,

    /// Files renamed to `<name>.bak-<timestamp>` before anything is
    /// created. Missing files are skipped; nothing is ever deleted.
    pub backup: Vec<PathBuf>,

    /// Unix mode applied to every created path.
    pub mode: Option<u32>,

    /// Apply `mode` to everything beneath each directory as well.
    pub recursive: bool,
}
