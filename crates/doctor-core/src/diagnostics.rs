//! Diagnostic aggregation: the operator-facing narrative of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// What a narrative entry reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A critical step failed after its retry; the run aborted.
    CriticalStepFailure,
    /// A soft step failed after its retry; the run continued.
    SoftStepFailure,
    /// A step failed, was remediated, and passed on retry.
    StepRecovered,
    /// A brute-force routine ran with its own failures suppressed.
    BestEffortFix,
    /// No remediation routine is registered for a category.
    RemediationUnavailable,
    /// Post-pipeline verification failed.
    VerificationFailure,
    /// Remediation ran its course and the system is still unhealthy.
    RemediationExhausted,
}

impl FailureKind {
    fn tag(&self) -> &'static str {
        match self {
            FailureKind::CriticalStepFailure => "CRITICAL",
            FailureKind::SoftStepFailure => "WARN",
            FailureKind::StepRecovered => "RECOVERED",
            FailureKind::BestEffortFix => "UNVERIFIED",
            FailureKind::RemediationUnavailable => "NO-FIX",
            FailureKind::VerificationFailure => "UNHEALTHY",
            FailureKind::RemediationExhausted => "EXHAUSTED",
        }
    }
}

/// One entry of the diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub kind: FailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Append-only narrative log owned by one driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticLog {
    entries: Vec<Narrative>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.entries.push(Narrative {
            kind,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[Narrative] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose message contains `needle`.
    pub fn mentioning<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = &'a Narrative> + 'a {
        self.entries.iter().filter(move |n| n.message.contains(needle))
    }

    /// Entries of one kind.
    pub fn of_kind(&self, kind: FailureKind) -> impl Iterator<Item = &Narrative> + '_ {
        self.entries.iter().filter(move |n| n.kind == kind)
    }

    /// Numbered, tagged, one entry per line.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "  (no diagnostics recorded)\n".to_string();
        }
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(out, "  {:>2}. [{}] {}", i + 1, entry.kind.tag(), entry.message);
        }
        out
    }
}
