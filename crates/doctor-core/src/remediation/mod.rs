//! Tiered remediation with per-run idempotency.
//!
//! Every category has three routines, tried in order:
//! - **primary**: the dedicated fix,
//! - **alternate**: the same fix through a more invasive mechanism,
//! - **brute force**: unconditional low-level commands whose failures are
//!   suppressed, so escalation always terminates.
//!
//! A category is attempted at most once per ledger state. Brute-force
//! suppression is logged and recorded as an unverified fix rather than
//! hidden.

mod routines;

use doctor_target::TargetSystem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};

use crate::config::RunContext;
use crate::diagnostics::{DiagnosticLog, FailureKind};
use crate::domain::FixCategory;
use crate::ledger::AppliedFixLedger;
use crate::op::{execute_op, is_deployed, TargetOp};

pub use routines::standard_plans;

/// Escalation level of a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationTier {
    Primary,
    Alternate,
    BruteForce,
}

impl RemediationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationTier::Primary => "primary",
            RemediationTier::Alternate => "alternate",
            RemediationTier::BruteForce => "brute-force",
        }
    }
}

/// The three routines for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    pub category: FixCategory,
    pub primary: Vec<TargetOp>,
    pub alternate: Vec<TargetOp>,
    pub brute_force: Vec<TargetOp>,
}

impl RemediationPlan {
    pub fn routine(&self, tier: RemediationTier) -> &[TargetOp] {
        match tier {
            RemediationTier::Primary => &self.primary,
            RemediationTier::Alternate => &self.alternate,
            RemediationTier::BruteForce => &self.brute_force,
        }
    }
}

/// How a remediation request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationResolution {
    /// Ledger already had the category; nothing ran.
    AlreadyApplied,

    /// The given tier completed. Brute force always "completes";
    /// `suppressed_failures` counts the operations it ignored.
    Applied {
        tier: RemediationTier,
        suppressed_failures: usize,
    },

    /// No plan registered for the category.
    Unavailable,
}

/// One remediation request and its resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationRecord {
    pub category: FixCategory,
    pub resolution: RemediationResolution,
}

impl RemediationRecord {
    /// The caller may treat the category as handled.
    pub fn succeeded(&self) -> bool {
        !matches!(self.resolution, RemediationResolution::Unavailable)
    }

    /// Tier that ran, if any ran.
    pub fn tier(&self) -> Option<RemediationTier> {
        match self.resolution {
            RemediationResolution::Applied { tier, .. } => Some(tier),
            _ => None,
        }
    }
}

/// Category → routines, plus the escalation logic.
#[derive(Debug, Clone, Default)]
pub struct RemediationRegistry {
    plans: BTreeMap<FixCategory, RemediationPlan>,
}

impl RemediationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in routine for every category.
    pub fn standard(ctx: &RunContext) -> Self {
        let mut registry = Self::new();
        for plan in standard_plans(ctx) {
            registry.register(plan);
        }
        registry
    }

    /// Add or replace the plan for `plan.category`.
    pub fn register(&mut self, plan: RemediationPlan) {
        self.plans.insert(plan.category, plan);
    }

    pub fn plan(&self, category: FixCategory) -> Option<&RemediationPlan> {
        self.plans.get(&category)
    }

    /// Remediate `category`, escalating primary → alternate → brute force.
    ///
    /// Returns immediately if the ledger already holds the category. Any
    /// completed tier marks the category applied; a completed comprehensive
    /// pass marks every category applied.
    pub async fn remediate(
        &self,
        category: FixCategory,
        ledger: &mut AppliedFixLedger,
        target: &dyn TargetSystem,
        diagnostics: &mut DiagnosticLog,
    ) -> RemediationRecord {
        if ledger.is_applied(category) {
            info!(category = %category, "Remediation already applied this run, skipping");
            return RemediationRecord {
                category,
                resolution: RemediationResolution::AlreadyApplied,
            };
        }

        let Some(plan) = self.plans.get(&category) else {
            warn!(category = %category, "No remediation routine registered");
            diagnostics.push(
                FailureKind::RemediationUnavailable,
                format!("no remediation routine registered for {}", category),
            );
            return RemediationRecord {
                category,
                resolution: RemediationResolution::Unavailable,
            };
        };

        let resolution = 'escalate: {
            for tier in [RemediationTier::Primary, RemediationTier::Alternate] {
                info!(category = %category, tier = tier.as_str(), "Applying remediation");
                match run_routine(target, plan.routine(tier)).await {
                    Ok(()) => {
                        info!(category = %category, tier = tier.as_str(), "Remediation succeeded");
                        break 'escalate RemediationResolution::Applied {
                            tier,
                            suppressed_failures: 0,
                        };
                    }
                    Err(reason) => {
                        warn!(
                            category = %category,
                            tier = tier.as_str(),
                            reason = %reason,
                            "Remediation routine failed, escalating"
                        );
                    }
                }
            }

            let suppressed = run_brute_force(target, category, &plan.brute_force).await;
            let detail = if suppressed.is_empty() {
                "all commands completed".to_string()
            } else {
                format!("suppressed failures: {}", suppressed.join("; "))
            };
            diagnostics.push(
                FailureKind::BestEffortFix,
                format!(
                    "{} remediation fell through to brute-force routine, assumed fixed without verification ({})",
                    category, detail
                ),
            );
            RemediationResolution::Applied {
                tier: RemediationTier::BruteForce,
                suppressed_failures: suppressed.len(),
            }
        };

        if category == FixCategory::Comprehensive {
            ledger.mark_comprehensive();
        } else {
            ledger.mark_applied(category);
        }

        RemediationRecord {
            category,
            resolution,
        }
    }
}

/// Run ops in order; the first failure fails the routine.
async fn run_routine(target: &dyn TargetSystem, ops: &[TargetOp]) -> Result<(), String> {
    for op in ops {
        let outcome = execute_op(target, op).await;
        if !outcome.success {
            return Err(format!("{}: {}", op.describe(), outcome.exit_info));
        }
    }
    Ok(())
}

/// Run every op regardless of failures; returns the failures it swallowed.
/// Deployment guards are resolved in place so each op of the chosen branch
/// also runs on its own.
async fn run_brute_force(
    target: &dyn TargetSystem,
    category: FixCategory,
    ops: &[TargetOp],
) -> Vec<String> {
    warn!(category = %category, "Applying brute-force remediation, failures will be suppressed");
    let mut suppressed = Vec::new();
    let mut queue: VecDeque<&TargetOp> = ops.iter().collect();
    while let Some(op) = queue.pop_front() {
        if let TargetOp::IfDeployed {
            container,
            then,
            otherwise,
        } = op
        {
            let branch = if is_deployed(target, container).await {
                then
            } else {
                otherwise
            };
            for inner in branch.iter().rev() {
                queue.push_front(inner);
            }
            continue;
        }
        let outcome = execute_op(target, op).await;
        if !outcome.success {
            warn!(
                category = %category,
                op = %op.describe(),
                exit = %outcome.exit_info,
                "Suppressed brute-force failure"
            );
            suppressed.push(format!("{} ({})", op.describe(), outcome.exit_info));
        }
    }
    suppressed
}
