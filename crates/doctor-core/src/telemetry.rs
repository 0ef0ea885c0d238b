//! Logging for deploy-doctor runs.
//!
//! Two output streams with different readers:
//! - stderr carries `tracing` events (step starts, classified faults,
//!   remediation tiers, suppressed brute-force failures, health-check attempts),
//! - stdout carries the rendered run report and nothing else, so
//!   `deploy-doctor deploy > run.txt` captures a clean narrative.
//!
//! Readiness and health polling fire one HTTP request per attempt. At
//! `debug` the HTTP client stack would drown the orchestration events, so
//! the default filter pins `hyper`, `reqwest` and `rustls` to `warn` while
//! our own crates follow the requested level. `RUST_LOG` replaces the
//! whole default when set.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events are worth reading during a run.
const OWN_TARGETS: [&str; 3] = ["deploy_doctor", "doctor_core", "doctor_target"];

/// HTTP client internals, noisy once per probe attempt.
const QUIET_TARGETS: [&str; 3] = ["hyper", "reqwest", "rustls"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|t| format!("{}={}", t, level)));
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{}=warn", t)));
    directives.join(",")
}

/// Install the global subscriber. Only the first call in a process takes
/// effect.
///
/// With `json`, every event is one JSON object per line for log shippers;
/// otherwise a compact human format without module paths.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json().with_current_span(false))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.compact())
            .try_init()
            .ok();
    }
}
