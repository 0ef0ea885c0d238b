//! Run report: the persisted, digest-protected record of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::diagnostics::DiagnosticLog;
use crate::domain::{DoctorError, FixCategory, Result, StepRecord, VerificationResult};
use crate::driver::{DriverState, RunOutcome};
use crate::remediation::RemediationRecord;

const REPORT_FILE: &str = "report.json";
const DIGEST_FILE: &str = "report.digest";

/// Everything a run did, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub states: Vec<DriverState>,
    pub steps: Vec<StepRecord>,
    pub remediations: Vec<RemediationRecord>,

    /// One entry per verifier call: the first, and the final one if any.
    pub verifications: Vec<VerificationResult>,

    pub diagnostics: DiagnosticLog,

    /// Ledger contents at the end of the run.
    pub ledger: Vec<FixCategory>,
}

impl RunReport {
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    /// Final verification, if the run got that far.
    pub fn final_verification(&self) -> Option<&VerificationResult> {
        self.verifications.last()
    }

    /// Operator-facing summary.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let verdict = match self.outcome {
            RunOutcome::Succeeded => "SUCCEEDED",
            RunOutcome::Failed => "FAILED",
        };
        let elapsed = (self.finished_at - self.started_at).num_seconds();
        let _ = writeln!(out, "Run {}: {} ({}s)", self.run_id, verdict, elapsed);

        let states: Vec<_> = self.states.iter().map(DriverState::as_str).collect();
        let _ = writeln!(out, "  states: {}", states.join(" -> "));

        let _ = writeln!(out, "\nSteps:");
        for step in &self.steps {
            let mark = if step.success { "ok" } else { "FAILED" };
            let _ = write!(
                out,
                "  [{}] {} ({} attempt{})",
                mark,
                step.name,
                step.attempts,
                if step.attempts == 1 { "" } else { "s" }
            );
            if !step.remediated.is_empty() {
                let fixes: Vec<_> = step.remediated.iter().map(FixCategory::as_str).collect();
                let _ = write!(out, " remediated: {}", fixes.join(", "));
            }
            let _ = writeln!(out);
        }

        if let Some(verification) = self.final_verification() {
            let _ = writeln!(out, "\nVerification:");
            for check in verification.checks() {
                let mark = if check.passed { "pass" } else { "FAIL" };
                let _ = writeln!(out, "  [{}] {}: {}", mark, check.name, check.detail);
            }
        }

        let _ = writeln!(out, "\nDiagnostics:");
        out.push_str(&self.diagnostics.render());
        out
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `<dir>/<run_id>/report.json` plus its SHA-256 digest.
pub fn write_run_report(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(&report.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let report_path = run_dir.join(REPORT_FILE);
    let json = serde_json::to_vec_pretty(report)?;

    std::fs::write(&report_path, &json)?;
    std::fs::write(run_dir.join(DIGEST_FILE), sha256_hex(&json))?;

    Ok(report_path)
}

/// Read `<dir>/<run_id>/report.json`, refusing it if the digest differs.
pub fn read_run_report(run_id: &str, dir: &Path) -> Result<RunReport> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join(REPORT_FILE))?;
    let expected = std::fs::read_to_string(run_dir.join(DIGEST_FILE))?;

    let actual = sha256_hex(&json);
    if expected.trim() != actual {
        return Err(DoctorError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }

    Ok(serde_json::from_slice(&json)?)
}
