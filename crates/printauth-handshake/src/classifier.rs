//! Classification of failed authentication responses.
//!
//! The endpoint reports failures as free text. A classifier maps that text to
//! an `ErrorCategory` so each category can carry its own remediation. The
//! `Classifier` trait is the seam for a structured-code classifier once the
//! endpoint provides one; `MessageClassifier` keeps the wording-based rules.

use printauth_core::ErrorCategory;

pub trait Classifier: Send + Sync {
    fn classify(&self, message: &str) -> ErrorCategory;
}

/// Substring rules in priority order. The first rule with a matching needle
/// wins; matching is case-sensitive.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::ConfigurationError,
        &["credentials failed", "Plugin settings error"],
    ),
    (ErrorCategory::NetworkError, &["Network error", "timed out"]),
    (
        ErrorCategory::PermissionError,
        &[
            "Permission denied",
            "not found",
            "lacks required permission",
            "not granted",
        ],
    ),
];

/// Wording-based classifier matching the endpoint's failure messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageClassifier;

impl Classifier for MessageClassifier {
    fn classify(&self, message: &str) -> ErrorCategory {
        RULES
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| message.contains(needle)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::GenericAuthError)
    }
}

/// Classify with the default wording-based rules.
pub fn classify(message: &str) -> ErrorCategory {
    MessageClassifier.classify(message)
}
