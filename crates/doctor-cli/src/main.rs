//! deploy-doctor - self-healing deployment orchestrator CLI
//!
//! ## Commands
//!
//! - `deploy`: run the full plan with remediation and verification
//! - `verify`: run the health checks only
//! - `diagnose`: classify recent logs of one component
//! - `report`: print a stored run report after checking its digest

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doctor_core::{
    init_tracing, read_run_report, write_run_report, FaultClassifier, FixCategory, Orchestrator,
    OrchestratorConfig, RunLock, RunReport, Verifier,
};
use doctor_target::{DockerTarget, TargetSystem};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use std::io::Write;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "deploy-doctor")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Self-healing deployment orchestrator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// JSON file with orchestrator settings (defaults apply for missing keys)
    #[arg(long, global = true, env = "DOCTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of the compose project
    #[arg(long, global = true, env = "DOCTOR_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Ports and domain of the deployed stack.
#[derive(Args, Debug, Default, PartialEq, Eq)]
struct StackArgs {
    /// Port the application listens on
    #[arg(long, env = "DOCTOR_INTERNAL_PORT")]
    internal_port: Option<u16>,

    /// Port the reverse proxy exposes
    #[arg(long, env = "DOCTOR_EXTERNAL_PORT")]
    external_port: Option<u16>,

    /// Public domain name (default: localhost)
    #[arg(long, env = "DOCTOR_DOMAIN")]
    domain: Option<String>,
}

impl StackArgs {
    fn apply(&self, config: &mut OrchestratorConfig) {
        if let Some(port) = self.internal_port {
            config.internal_port = port;
        }
        if let Some(port) = self.external_port {
            config.external_port = port;
        }
        if let Some(domain) = &self.domain {
            config.domain = Some(domain.clone());
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the stack, repairing failures along the way
    Deploy {
        /// Persistent data directory
        #[arg(env = "DOCTOR_DATA_DIR")]
        data_dir: PathBuf,

        #[command(flatten)]
        stack: StackArgs,

        /// Where run reports are written (default: <DATA_DIR>/runs)
        #[arg(long, env = "DOCTOR_REPORT_DIR")]
        report_dir: Option<PathBuf>,
    },

    /// Check that the stack is running and healthy
    Verify {
        #[command(flatten)]
        stack: StackArgs,
    },

    /// Classify recent logs of a component without repairing anything
    Diagnose {
        /// Container to read logs from
        component: String,

        /// How far back to read, in seconds
        #[arg(long, default_value = "300")]
        since: u64,
    },

    /// Show a stored run report
    Report {
        /// Run ID printed at the end of `deploy`
        run_id: String,

        /// Directory containing run reports
        #[arg(long, env = "DOCTOR_REPORT_DIR", default_value = "data/runs")]
        report_dir: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.project_dir {
        config.project_dir = dir;
    }

    let code = match cli.command {
        Commands::Deploy {
            data_dir,
            stack,
            report_dir,
        } => {
            config.data_dir = data_dir;
            stack.apply(&mut config);
            let report_dir = report_dir.unwrap_or_else(|| config.data_dir.join("runs"));
            cmd_deploy(&config, &report_dir).await?
        }
        Commands::Verify { stack } => {
            stack.apply(&mut config);
            cmd_verify(&config).await?
        }
        Commands::Diagnose { component, since } => {
            cmd_diagnose(&config, &component, Duration::from_secs(since)).await?
        }
        Commands::Report { run_id, report_dir } => cmd_report(&run_id, &report_dir)?,
    };

    Ok(ExitCode::from(code))
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    let Some(path) = path else {
        return Ok(OrchestratorConfig::default());
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

fn docker_target(config: &OrchestratorConfig) -> Result<DockerTarget> {
    DockerTarget::new(config.docker_target_config()).context("Failed to set up docker target")
}

async fn cmd_deploy(config: &OrchestratorConfig, report_dir: &Path) -> Result<u8> {
    let _lock = RunLock::acquire(&config.data_dir).context("Failed to acquire run lock")?;
    let target = Arc::new(docker_target(config)?);
    let ctx = config.context();

    println!(
        "Deploying {} (app :{}, proxy :{}) from {}",
        ctx.server_name,
        ctx.internal_port,
        ctx.external_port,
        ctx.data_dir.display()
    );

    let report = Orchestrator::new(target, &ctx).run().await;
    present_report(&report, report_dir, &mut std::io::stdout().lock())
}

/// Print the run's diagnostics, then persist the report. A report that
/// cannot be saved is a warning; the exit code always follows the run.
fn present_report(report: &RunReport, report_dir: &Path, out: &mut impl Write) -> Result<u8> {
    writeln!(out)?;
    write!(out, "{}", report.render())?;
    match write_run_report(report, report_dir) {
        Ok(path) => writeln!(out, "\nReport: {}", path.display())?,
        Err(e) => {
            warn!(error = %e, dir = %report_dir.display(), "Failed to write run report");
            writeln!(out, "\nReport not saved: {}", e)?;
        }
    }
    out.flush()?;
    Ok(report.exit_code())
}

async fn cmd_verify(config: &OrchestratorConfig) -> Result<u8> {
    let target = docker_target(config)?;
    let verifier = Verifier::from_context(&config.context());
    let result = verifier.verify(&target).await;

    for check in result.checks() {
        let mark = if check.passed { "pass" } else { "FAIL" };
        println!("[{}] {}: {}", mark, check.name, check.detail);
    }
    if result.overall() {
        println!("Healthy");
        Ok(0)
    } else {
        println!("Unhealthy");
        Ok(1)
    }
}

async fn cmd_diagnose(config: &OrchestratorConfig, component: &str, since: Duration) -> Result<u8> {
    let target = docker_target(config)?;
    let logs = target
        .read_logs(component, since)
        .await
        .with_context(|| format!("Failed to read logs of {}", component))?;
    info!(component, bytes = logs.len(), "Read component logs");

    println!("{}", render_signal(&FaultClassifier::standard(), &logs));
    Ok(0)
}

fn render_signal(classifier: &FaultClassifier, logs: &str) -> String {
    let signal = classifier.diagnose(logs);
    if signal.is_empty() {
        return format!(
            "No recognizable fault signal; a deploy would try: {}",
            FixCategory::FALLBACK
        );
    }
    let categories: Vec<_> = signal
        .matched_categories
        .iter()
        .map(FixCategory::as_str)
        .collect();
    format!("Fault categories: {}", categories.join(", "))
}

fn cmd_report(run_id: &str, report_dir: &Path) -> Result<u8> {
    let report = read_run_report(run_id, report_dir)
        .with_context(|| format!("Failed to load report for run {}", run_id))?;
    print!("{}", report.render());
    println!("\nReport digest verified");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctor_core::RunOutcome;
    use doctor_target::fakes::FakeTarget;

    #[test]
    fn test_deploy_args_override_config() {
        let cli = Cli::try_parse_from([
            "deploy-doctor",
            "deploy",
            "/srv/app-data",
            "--internal-port",
            "8000",
            "--domain",
            "maint.example.org",
        ])
        .unwrap();

        let Commands::Deploy {
            data_dir,
            stack,
            report_dir,
        } = cli.command
        else {
            panic!("expected deploy");
        };
        assert_eq!(data_dir, PathBuf::from("/srv/app-data"));
        assert!(report_dir.is_none());

        let mut config = OrchestratorConfig::default();
        stack.apply(&mut config);
        assert_eq!(config.internal_port, 8000);
        assert_eq!(config.external_port, 443);
        assert_eq!(config.domain.as_deref(), Some("maint.example.org"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["deploy-doctor", "diagnose", "maintenance-app", "-v", "--json"])
                .unwrap();
        assert!(cli.verbose);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Diagnose { since: 300, .. }
        ));
    }

    #[test]
    fn test_load_config_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctor.json");
        std::fs::write(&path, r#"{"network_name": "edge-net", "verify_attempts": 2}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.network_name, "edge-net");
        assert_eq!(config.verify_attempts, 2);
        assert_eq!(config.internal_port, 5000);
    }

    #[test]
    fn test_load_config_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doctor.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_render_signal() {
        let classifier = FaultClassifier::standard();
        assert_eq!(
            render_signal(&classifier, "permission denied writing /app/data"),
            "Fault categories: permissions"
        );
        assert!(render_signal(&classifier, "").contains("network"));
    }

    #[tokio::test]
    async fn test_unsaved_report_still_prints_diagnostics() {
        let mut config = OrchestratorConfig::default();
        config.data_dir = "/nonexistent/deploy-doctor-cli".into();
        config.poll_interval_secs = 0;
        let fake = Arc::new(FakeTarget::new());
        fake.fail_container("build", 2, "failed to solve");
        let report = Orchestrator::new(fake, &config.context()).run().await;
        assert_eq!(report.outcome, RunOutcome::Failed);

        // A regular file where the report directory should be.
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("runs");
        std::fs::write(&blocked, b"").unwrap();

        let mut out = Vec::new();
        let code = present_report(&report, &blocked, &mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();

        assert_eq!(code, report.exit_code());
        assert!(printed.contains("build containers"));
        assert!(printed.contains("Report not saved"));
    }

    #[tokio::test]
    async fn test_cmd_report_reads_stored_run() {
        let mut config = OrchestratorConfig::default();
        config.data_dir = "/nonexistent/deploy-doctor-cli".into();
        config.poll_interval_secs = 0;
        let report = Orchestrator::new(Arc::new(FakeTarget::new()), &config.context())
            .run()
            .await;
        assert_eq!(report.outcome, RunOutcome::Succeeded);

        let dir = tempfile::tempdir().unwrap();
        write_run_report(&report, dir.path()).unwrap();
        assert_eq!(cmd_report(&report.run_id, dir.path()).unwrap(), 0);
        assert!(cmd_report("missing-run", dir.path()).is_err());
    }
}
