//! Orchestrator configuration and the per-run context derived from it.

use doctor_target::{DockerTargetConfig, ProxyParams};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::poll::PollPolicy;

/// Where certificates live inside the proxy container.
const PROXY_SSL_DIR: &str = "/etc/nginx/ssl";

/// Operator-facing settings for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Persistent data directory (database, templates, certificates, proxy config).
    pub data_dir: PathBuf,

    /// Directory of the compose project.
    pub project_dir: PathBuf,

    /// Compose file, relative to `project_dir`.
    pub compose_file: PathBuf,

    /// Port the application listens on.
    pub internal_port: u16,

    /// Port the reverse proxy exposes.
    pub external_port: u16,

    /// Public domain; `localhost` when unset.
    pub domain: Option<String>,

    pub network_name: String,
    pub app_container: String,
    pub proxy_container: String,

    /// Path of the health endpoint on the application.
    pub health_path: String,

    /// Text a healthy response body must contain.
    pub health_marker: String,

    /// Database file name inside `data_dir`.
    pub db_file: String,

    /// Command run inside the app container to initialise the database.
    pub db_init_command: Vec<String>,

    /// Image used for root-level helper containers.
    pub helper_image: String,

    pub command_timeout_secs: u64,
    pub container_timeout_secs: u64,
    pub build_timeout_secs: u64,
    pub probe_timeout_secs: u64,

    /// Interval between readiness probes.
    pub poll_interval_secs: u64,

    /// Probe attempts while waiting for the stack to come up.
    pub readiness_attempts: u32,

    /// Probe attempts per health check during verification.
    pub verify_attempts: u32,

    /// How far back logs are read when classifying a failure.
    pub log_window_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            project_dir: PathBuf::from("."),
            compose_file: PathBuf::from("docker-compose.yml"),
            internal_port: 5000,
            external_port: 443,
            domain: None,
            network_name: "maintenance-net".to_string(),
            app_container: "maintenance-app".to_string(),
            proxy_container: "maintenance-nginx".to_string(),
            health_path: "/health".to_string(),
            health_marker: "healthy".to_string(),
            db_file: "maintenance.db".to_string(),
            db_init_command: vec!["python".to_string(), "init_db.py".to_string()],
            helper_image: "alpine:3.19".to_string(),
            command_timeout_secs: 30,
            container_timeout_secs: 120,
            build_timeout_secs: 900,
            probe_timeout_secs: 5,
            poll_interval_secs: 2,
            readiness_attempts: 15,
            verify_attempts: 5,
            log_window_secs: 300,
        }
    }
}

impl OrchestratorConfig {
    /// Resolve derived paths, URLs and policies for one run.
    pub fn context(&self) -> RunContext {
        let interval = Duration::from_secs(self.poll_interval_secs);
        let health_path = if self.health_path.starts_with('/') {
            self.health_path.clone()
        } else {
            format!("/{}", self.health_path)
        };

        RunContext {
            data_dir: self.data_dir.clone(),
            templates_dir: self.data_dir.join("templates"),
            ssl_dir: self.data_dir.join("ssl"),
            db_path: self.data_dir.join(&self.db_file),
            proxy_config_path: self.data_dir.join("nginx").join("default.conf"),
            network_name: self.network_name.clone(),
            app_container: self.app_container.clone(),
            proxy_container: self.proxy_container.clone(),
            internal_port: self.internal_port,
            external_port: self.external_port,
            server_name: self
                .domain
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
            app_health_url: format!("http://127.0.0.1:{}{}", self.internal_port, health_path),
            proxy_health_url: format!("https://127.0.0.1:{}{}", self.external_port, health_path),
            health_marker: self.health_marker.clone(),
            db_init_command: self.db_init_command.clone(),
            helper_image: self.helper_image.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            readiness: PollPolicy::new(interval, self.readiness_attempts),
            verify_poll: PollPolicy::new(interval, self.verify_attempts),
            log_window: Duration::from_secs(self.log_window_secs),
        }
    }

    /// Settings for the docker-backed target.
    pub fn docker_target_config(&self) -> DockerTargetConfig {
        DockerTargetConfig {
            project_dir: self.project_dir.clone(),
            compose_file: self.compose_file.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            container_timeout: Duration::from_secs(self.container_timeout_secs),
            build_timeout: Duration::from_secs(self.build_timeout_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            accept_invalid_certs: true,
        }
    }
}

/// Everything a run needs to know about the target, passed explicitly to
/// every component (the network name included; nothing is handed over
/// through side files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub data_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub ssl_dir: PathBuf,
    pub db_path: PathBuf,
    pub proxy_config_path: PathBuf,
    pub network_name: String,
    pub app_container: String,
    pub proxy_container: String,
    pub internal_port: u16,
    pub external_port: u16,
    pub server_name: String,
    pub app_health_url: String,
    pub proxy_health_url: String,
    pub health_marker: String,
    pub db_init_command: Vec<String>,
    pub helper_image: String,
    pub command_timeout: Duration,
    pub readiness: PollPolicy,
    pub verify_poll: PollPolicy,
    pub log_window: Duration,
}

impl RunContext {
    pub fn certificate_path(&self) -> PathBuf {
        self.ssl_dir.join("cert.pem")
    }

    pub fn certificate_key_path(&self) -> PathBuf {
        self.ssl_dir.join("key.pem")
    }

    /// Parameters for the reverse-proxy template.
    pub fn proxy_params(&self) -> ProxyParams {
        ProxyParams {
            server_name: self.server_name.clone(),
            listen_port: self.external_port,
            upstream_host: self.app_container.clone(),
            upstream_port: self.internal_port,
            certificate: format!("{}/cert.pem", PROXY_SSL_DIR),
            certificate_key: format!("{}/key.pem", PROXY_SSL_DIR),
            output_path: self.proxy_config_path.clone(),
        }
    }
}
