//! Fault classification from raw log text.
//!
//! Classification is table driven: each [`ClassifierRule`] pairs a category
//! with keyword patterns, and any matching pattern adds its category. A
//! single excerpt may land in several categories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::FixCategory;

/// A case-insensitive keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matches anywhere in the text.
    Substring(String),

    /// Matches only when not surrounded by alphanumerics (`db` in `app.db`, not in `feedback`).
    Word(String),
}

impl Pattern {
    pub fn substring(p: &str) -> Self {
        Pattern::Substring(p.to_lowercase())
    }

    pub fn word(p: &str) -> Self {
        Pattern::Word(p.to_lowercase())
    }

    /// `haystack` must already be lowercase.
    fn matches(&self, haystack: &str) -> bool {
        match self {
            Pattern::Substring(p) => haystack.contains(p.as_str()),
            Pattern::Word(w) => contains_word(haystack, w),
        }
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Category plus the patterns that select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRule {
    pub category: FixCategory,
    pub patterns: Vec<Pattern>,
}

impl ClassifierRule {
    pub fn new(category: FixCategory, patterns: Vec<Pattern>) -> Self {
        Self { category, patterns }
    }
}

/// Log text plus the categories it classified into. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSignal {
    pub source_text: String,
    pub matched_categories: BTreeSet<FixCategory>,
}

impl DiagnosticSignal {
    /// No rule matched.
    pub fn is_empty(&self) -> bool {
        self.matched_categories.is_empty()
    }

    /// Matched categories, or the fallback category when nothing matched.
    pub fn actionable_categories(&self) -> Vec<FixCategory> {
        if self.is_empty() {
            vec![FixCategory::FALLBACK]
        } else {
            self.matched_categories.iter().copied().collect()
        }
    }
}

/// Pure, deterministic keyword classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for FaultClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl FaultClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// The built-in keyword families.
    ///
    /// Missing files ("template", "not found", "missing") classify as
    /// permissions: both are repaired by the same recreate-and-chmod routine.
    pub fn standard() -> Self {
        use Pattern as P;
        Self::new(vec![
            ClassifierRule::new(
                FixCategory::Permissions,
                vec![
                    P::substring("permission"),
                    P::substring("denied"),
                    P::substring("access"),
                    P::substring("template"),
                    P::substring("not found"),
                    P::substring("missing"),
                ],
            ),
            ClassifierRule::new(
                FixCategory::Database,
                vec![P::substring("database"), P::substring("sqlite"), P::word("db")],
            ),
            ClassifierRule::new(
                FixCategory::Network,
                vec![
                    P::substring("network"),
                    P::substring("connection"),
                    P::substring("refused"),
                    P::substring("connect"),
                ],
            ),
            ClassifierRule::new(
                FixCategory::Nginx,
                vec![
                    P::substring("nginx"),
                    P::substring("upstream"),
                    P::substring("bad gateway"),
                    P::substring("proxy_pass"),
                    P::word("emerg"),
                ],
            ),
        ])
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Categories whose patterns match `log_text`. Empty when nothing matches.
    pub fn classify(&self, log_text: &str) -> BTreeSet<FixCategory> {
        let haystack = log_text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.patterns.iter().any(|p| p.matches(&haystack)))
            .map(|rule| rule.category)
            .collect()
    }

    /// Classify and keep the source text.
    pub fn diagnose(&self, log_text: &str) -> DiagnosticSignal {
        DiagnosticSignal {
            source_text: log_text.to_string(),
            matched_categories: self.classify(log_text),
        }
    }
}

/// Classify with the standard rules.
pub fn classify(log_text: &str) -> BTreeSet<FixCategory> {
    FaultClassifier::standard().classify(log_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(categories: &[FixCategory]) -> BTreeSet<FixCategory> {
        categories.iter().copied().collect()
    }

    #[test]
    fn test_permission_denied() {
        assert_eq!(
            classify("permission denied writing /app/data"),
            set(&[FixCategory::Permissions])
        );
    }

    #[test]
    fn test_overlapping_categories() {
        assert_eq!(
            classify("Connection refused to database at sqlite path"),
            set(&[FixCategory::Network, FixCategory::Database])
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("PERMISSION DENIED"), set(&[FixCategory::Permissions]));
        assert_eq!(classify("SQLite locked"), set(&[FixCategory::Database]));
    }

    #[test]
    fn test_missing_template_is_permissions() {
        assert_eq!(
            classify("jinja2.exceptions.TemplateNotFound: index.html"),
            set(&[FixCategory::Permissions])
        );
        assert_eq!(
            classify("file missing: static/style.css"),
            set(&[FixCategory::Permissions])
        );
    }

    #[test]
    fn test_db_is_matched_as_word() {
        assert_eq!(
            classify("cannot open /data/app.db"),
            set(&[FixCategory::Database])
        );
        assert!(classify("thanks for the feedback").is_empty());
        assert!(classify("dbus daemon restarted").is_empty());
    }

    #[test]
    fn test_nginx_signatures() {
        assert_eq!(
            classify("nginx: [emerg] host not found in upstream \"app:5000\""),
            set(&[FixCategory::Permissions, FixCategory::Nginx])
        );
        assert_eq!(classify("502 Bad Gateway"), set(&[FixCategory::Nginx]));
    }

    #[test]
    fn test_empty_and_unmatched() {
        assert!(classify("").is_empty());
        assert!(classify("step exited with code 2").is_empty());
    }

    #[test]
    fn test_never_produces_comprehensive() {
        let text = "permission denied network database nginx comprehensive connect sqlite";
        let got = classify(text);
        assert!(!got.contains(&FixCategory::Comprehensive));
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn test_diagnose_fallback() {
        let classifier = FaultClassifier::standard();
        let signal = classifier.diagnose("exit status 137");
        assert!(signal.is_empty());
        assert_eq!(signal.actionable_categories(), vec![FixCategory::Network]);

        let signal = classifier.diagnose("access to /data denied; db locked");
        assert_eq!(
            signal.actionable_categories(),
            vec![FixCategory::Permissions, FixCategory::Database]
        );
    }

    #[test]
    fn test_custom_rules_are_additions() {
        let mut rules = FaultClassifier::standard().rules().to_vec();
        rules.push(ClassifierRule::new(
            FixCategory::Nginx,
            vec![Pattern::substring("ssl_certificate")],
        ));
        let classifier = FaultClassifier::new(rules);
        assert_eq!(
            classifier.classify("cannot load ssl_certificate"),
            set(&[FixCategory::Nginx])
        );
    }

    #[test]
    fn test_word_match_handles_multibyte_neighbours() {
        assert!(contains_word("é db é", "db"));
        assert!(!contains_word("édbé", "db"));
        assert!(!contains_word("anything", ""));
    }
}
