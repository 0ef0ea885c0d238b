//! Verifier output.

use serde::{Deserialize, Serialize};

/// One named health check outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Verdict of one full verification battery. Replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    overall: bool,
    checks: Vec<CheckResult>,
}

impl VerificationResult {
    /// Build a result whose `overall` is the AND of all `checks`.
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let overall = checks.iter().all(|c| c.passed);
        Self { overall, checks }
    }

    pub fn overall(&self) -> bool {
        self.overall
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    /// Checks that did not pass, in battery order.
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// `name: detail` for each failed check, comma separated.
    pub fn failure_summary(&self) -> String {
        self.failed_checks()
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
