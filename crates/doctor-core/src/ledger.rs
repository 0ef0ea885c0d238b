//! Per-run record of which remediation categories were already attempted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::FixCategory;

/// Idempotency ledger for remediation.
///
/// Only the remediation registry marks entries. The driver clears the
/// whole ledger exactly once, right before the final comprehensive pass,
/// which gives every category one more attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFixLedger {
    applied: BTreeSet<FixCategory>,
}

impl AppliedFixLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_applied(&self, category: FixCategory) -> bool {
        self.applied.contains(&category)
    }

    pub(crate) fn mark_applied(&mut self, category: FixCategory) {
        self.applied.insert(category);
    }

    /// Mark `Comprehensive` and every category it subsumes.
    pub(crate) fn mark_comprehensive(&mut self) {
        self.applied.extend(FixCategory::ALL);
    }

    /// Forget every attempt.
    pub fn clear(&mut self) {
        self.applied.clear();
    }

    /// Applied categories in stable order.
    pub fn applied(&self) -> impl Iterator<Item = FixCategory> + '_ {
        self.applied.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_clear() {
        let mut ledger = AppliedFixLedger::new();
        assert!(!ledger.is_applied(FixCategory::Network));

        ledger.mark_applied(FixCategory::Network);
        assert!(ledger.is_applied(FixCategory::Network));
        assert!(!ledger.is_applied(FixCategory::Database));

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_comprehensive_marks_everything() {
        let mut ledger = AppliedFixLedger::new();
        ledger.mark_comprehensive();
        for category in FixCategory::ALL {
            assert!(ledger.is_applied(category), "{} should be applied", category);
        }
    }

    #[test]
    fn test_serializes_as_category_list() {
        let mut ledger = AppliedFixLedger::new();
        ledger.mark_applied(FixCategory::Nginx);
        ledger.mark_applied(FixCategory::Network);
        let json = serde_json::to_string(&ledger).unwrap();
        assert_eq!(json, r#"{"applied":["network","nginx"]}"#);
    }
}
