use std::collections::BTreeSet;

use doctor_core::{classify, FaultClassifier, FixCategory};

fn set(categories: &[FixCategory]) -> BTreeSet<FixCategory> {
    categories.iter().copied().collect()
}

#[test]
fn permission_denied_is_permissions() {
    assert_eq!(
        classify("permission denied writing /app/data"),
        set(&[FixCategory::Permissions])
    );
}

#[test]
fn one_excerpt_can_match_several_categories() {
    assert_eq!(
        classify("Connection refused to database at sqlite path"),
        set(&[FixCategory::Network, FixCategory::Database])
    );
}

#[test]
fn proxy_errors_are_nginx() {
    assert_eq!(
        classify("nginx: [emerg] host not found in upstream \"app:5000\""),
        set(&[FixCategory::Nginx, FixCategory::Permissions])
    );
    assert_eq!(classify("502 Bad Gateway"), set(&[FixCategory::Nginx]));
}

#[test]
fn no_signal_is_empty_with_network_fallback() {
    let classifier = FaultClassifier::standard();
    for text in ["", "   ", "all good", "exit 137"] {
        let signal = classifier.diagnose(text);
        assert!(signal.is_empty(), "{:?}", text);
        assert_eq!(signal.actionable_categories(), vec![FixCategory::Network]);
    }
}

#[test]
fn db_is_matched_as_a_word() {
    assert_eq!(classify("failed to open db file"), set(&[FixCategory::Database]));
    assert!(classify("feedback loop").is_empty());
}

#[test]
fn classification_is_total_and_never_comprehensive() {
    let classifier = FaultClassifier::standard();
    let long = "x".repeat(100_000);
    let inputs = [
        "PERMISSION DENIED",
        "\u{0}\u{1f}\u{7f}",
        "ñandú 数据库 connection",
        long.as_str(),
        "TemplateNotFound: index.html",
        "OperationalError: unable to open database file",
    ];
    for text in inputs {
        let result = classifier.classify(text);
        assert!(!result.contains(&FixCategory::Comprehensive));
        assert_eq!(result, classifier.classify(text), "deterministic");
    }
}
