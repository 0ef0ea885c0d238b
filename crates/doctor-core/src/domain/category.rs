//! Fault / remediation categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of fault categories, each with its own remediation routine.
///
/// `Comprehensive` is never produced by classification. It is the
/// whole-stack repair used as a last resort, and succeeding at it counts
/// as having repaired every other category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixCategory {
    Network,
    Permissions,
    Database,
    Nginx,
    Comprehensive,
}

impl FixCategory {
    /// Every category, comprehensive last.
    pub const ALL: [FixCategory; 5] = [
        FixCategory::Network,
        FixCategory::Permissions,
        FixCategory::Database,
        FixCategory::Nginx,
        FixCategory::Comprehensive,
    ];

    /// Categories subsumed by `Comprehensive`.
    pub const SPECIFIC: [FixCategory; 4] = [
        FixCategory::Network,
        FixCategory::Permissions,
        FixCategory::Database,
        FixCategory::Nginx,
    ];

    /// Category assumed when a failure carries no recognizable signal.
    pub const FALLBACK: FixCategory = FixCategory::Network;

    pub fn as_str(&self) -> &'static str {
        match self {
            FixCategory::Network => "network",
            FixCategory::Permissions => "permissions",
            FixCategory::Database => "database",
            FixCategory::Nginx => "nginx",
            FixCategory::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for FixCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
