//! # Failure Classification
//!
//! Decides whether a failure is worth retrying. Classification is an ordered
//! decision table: each rule pairs a predicate over the error with a verdict,
//! rules are evaluated first-match-wins, and anything unmatched comes back
//! `Unknown`. Callers treat `Unknown` as terminal so unrecognized failures
//! fail fast instead of looping.
//!
//! Two built-in rule families ship with the classifier: structural matches on
//! [`TransportError`] variants (used by the status reporter to gate retries)
//! and case-insensitive message matches over the error's source chain (used
//! by the task runner to label business failures). Caller-supplied rules are
//! always consulted before the built-ins.
//!
//! ## Usage
//!
//! ```rust
//! use taskkit::{ClassificationRule, ErrorClassifier, ErrorVerdict};
//!
//! let classifier = ErrorClassifier::new().with_rule(ClassificationRule::message_contains(
//!     "stale_snapshot",
//!     &["snapshot expired"],
//!     ErrorVerdict::Retryable,
//! ));
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "snapshot expired mid-read");
//! assert_eq!(classifier.classify(&error), ErrorVerdict::Retryable);
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::orchestrator::TransportError;

/// Outcome of classifying one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorVerdict {
    /// Transient; retrying may succeed
    Retryable,

    /// Permanent; retrying cannot succeed
    Terminal,

    /// No rule matched; treated as terminal to avoid unbounded retries
    Unknown,
}

impl ErrorVerdict {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }

    /// Label attached to failure reports and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::Terminal => "terminal",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Predicate forms a classification rule can take
enum RuleMatcher {
    /// Any of the needles appears in the lowercased error chain text
    MessageContains(Vec<String>),

    /// A [`TransportError`] in the source chain satisfies the check
    Transport(fn(&TransportError) -> bool),

    /// Arbitrary predicate over the error
    Predicate(PredicateFn),
}

type PredicateFn = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

/// One predicate → verdict pair in the classification table
pub struct ClassificationRule {
    name: String,
    matcher: RuleMatcher,
    verdict: ErrorVerdict,
}

impl ClassificationRule {
    /// Rule matching any of the given needles in the error chain text
    ///
    /// Matching is case-insensitive over the joined `Display` output of the
    /// error and every error in its source chain.
    pub fn message_contains(
        name: impl Into<String>,
        needles: &[&str],
        verdict: ErrorVerdict,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: RuleMatcher::MessageContains(
                needles.iter().map(|n| n.to_lowercase()).collect(),
            ),
            verdict,
        }
    }

    /// Rule matching a [`TransportError`] found anywhere in the source chain
    pub fn transport(
        name: impl Into<String>,
        check: fn(&TransportError) -> bool,
        verdict: ErrorVerdict,
    ) -> Self {
        Self {
            name: name.into(),
            matcher: RuleMatcher::Transport(check),
            verdict,
        }
    }

    /// Rule with an arbitrary predicate over the error
    pub fn predicate<F>(name: impl Into<String>, check: F, verdict: ErrorVerdict) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matcher: RuleMatcher::Predicate(Arc::new(check)),
            verdict,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verdict(&self) -> ErrorVerdict {
        self.verdict
    }

    fn matches(&self, error: &(dyn StdError + 'static), chain_text: &str) -> bool {
        match &self.matcher {
            RuleMatcher::MessageContains(needles) => {
                needles.iter().any(|needle| chain_text.contains(needle))
            }
            RuleMatcher::Transport(check) => find_transport(error).map(check).unwrap_or(false),
            RuleMatcher::Predicate(check) => check(error),
        }
    }
}

impl fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("name", &self.name)
            .field("verdict", &self.verdict)
            .finish_non_exhaustive()
    }
}

/// Ordered first-match-wins failure classifier
///
/// Caller-supplied rules are evaluated before the built-in minimum set.
/// `classify` never panics: a panic inside any rule predicate is caught and
/// the overall verdict forced to `Unknown`.
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
    builtins: Vec<ClassificationRule>,
}

impl ErrorClassifier {
    /// Classifier with only the built-in rules
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            builtins: built_in_rules(),
        }
    }

    /// Classifier with caller rules evaluated ahead of the built-ins
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self {
            rules,
            builtins: built_in_rules(),
        }
    }

    /// Append one caller rule (still ahead of the built-ins)
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Classify an error; same error always yields the same verdict
    pub fn classify(&self, error: &(dyn StdError + 'static)) -> ErrorVerdict {
        match catch_unwind(AssertUnwindSafe(|| self.classify_inner(error))) {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!("classification rule panicked, forcing unknown verdict");
                ErrorVerdict::Unknown
            }
        }
    }

    /// Classify a business error carried as `anyhow::Error`
    pub fn classify_any(&self, error: &anyhow::Error) -> ErrorVerdict {
        let error: &(dyn StdError + 'static) = error.as_ref();
        self.classify(error)
    }

    fn classify_inner(&self, error: &(dyn StdError + 'static)) -> ErrorVerdict {
        let chain_text = chain_text(error);
        for rule in self.rules.iter().chain(self.builtins.iter()) {
            if rule.matches(error, &chain_text) {
                debug!(
                    rule = rule.name(),
                    verdict = %rule.verdict(),
                    "classification rule matched"
                );
                return rule.verdict();
            }
        }
        ErrorVerdict::Unknown
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("rules", &self.rules.len())
            .field("builtins", &self.builtins.len())
            .finish()
    }
}

/// Minimum rule set: throttling and transient network/timeout signals are
/// retryable, malformed input and authorization denials are terminal.
fn built_in_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::transport(
            "transport_throttled",
            |t| matches!(t, TransportError::Throttled { .. }),
            ErrorVerdict::Retryable,
        ),
        ClassificationRule::transport(
            "transport_transient",
            |t| {
                matches!(
                    t,
                    TransportError::Timeout { .. }
                        | TransportError::Connection { .. }
                        | TransportError::Unavailable { .. }
                )
            },
            ErrorVerdict::Retryable,
        ),
        ClassificationRule::transport(
            "transport_bad_request",
            |t| matches!(t, TransportError::BadRequest { .. }),
            ErrorVerdict::Terminal,
        ),
        ClassificationRule::transport(
            "transport_access_denied",
            |t| matches!(t, TransportError::AccessDenied { .. }),
            ErrorVerdict::Terminal,
        ),
        ClassificationRule::message_contains(
            "throttling_signals",
            &["throttl", "rate limit", "too many requests", "slow down"],
            ErrorVerdict::Retryable,
        ),
        ClassificationRule::message_contains(
            "transient_network_signals",
            &[
                "timeout",
                "timed out",
                "connection",
                "network",
                "temporarily unavailable",
                "service unavailable",
            ],
            ErrorVerdict::Retryable,
        ),
        ClassificationRule::message_contains(
            "authorization_signals",
            &[
                "authorization denied",
                "access denied",
                "unauthorized",
                "forbidden",
                "permission denied",
            ],
            ErrorVerdict::Terminal,
        ),
        ClassificationRule::message_contains(
            "invalid_input_signals",
            &["malformed", "invalid input", "validation failed"],
            ErrorVerdict::Terminal,
        ),
    ]
}

/// Walk the source chain looking for a [`TransportError`]
fn find_transport<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a TransportError> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(transport) = err.downcast_ref::<TransportError>() {
            return Some(transport);
        }
        current = err.source();
    }
    None
}

/// Lowercased `Display` output of the error and its whole source chain
fn chain_text(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        text.push_str(": ");
        text.push_str(&err.to_string());
        current = err.source();
    }
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    fn io_error(message: &str) -> io::Error {
        io::Error::new(io::ErrorKind::Other, message.to_string())
    }

    #[test]
    fn test_transport_throttled_is_retryable() {
        let classifier = ErrorClassifier::new();
        let err = TransportError::Throttled { retry_after: None };
        assert_eq!(classifier.classify(&err), ErrorVerdict::Retryable);
    }

    #[test]
    fn test_transport_transient_variants_are_retryable() {
        let classifier = ErrorClassifier::new();
        let errors = [
            TransportError::Timeout {
                elapsed: Duration::from_secs(10),
            },
            TransportError::Connection {
                message: "reset by peer".to_string(),
            },
            TransportError::Unavailable {
                message: "maintenance window".to_string(),
            },
        ];
        for err in &errors {
            assert_eq!(classifier.classify(err), ErrorVerdict::Retryable);
        }
    }

    #[test]
    fn test_transport_terminal_variants() {
        let classifier = ErrorClassifier::new();
        let err = TransportError::BadRequest {
            message: "missing run id".to_string(),
        };
        assert_eq!(classifier.classify(&err), ErrorVerdict::Terminal);

        let err = TransportError::AccessDenied {
            message: "expired credentials".to_string(),
        };
        assert_eq!(classifier.classify(&err), ErrorVerdict::Terminal);
    }

    #[test]
    fn test_transport_other_is_unknown() {
        let classifier = ErrorClassifier::new();
        let err = TransportError::Other {
            message: "gremlins".to_string(),
        };
        assert_eq!(classifier.classify(&err), ErrorVerdict::Unknown);
    }

    #[test]
    fn test_authorization_message_is_terminal() {
        let classifier = ErrorClassifier::new();
        let err = io_error("authorization denied");
        assert_eq!(classifier.classify(&err), ErrorVerdict::Terminal);
    }

    #[test]
    fn test_rate_limit_message_is_retryable() {
        let classifier = ErrorClassifier::new();
        let err = io_error("rate limit exceeded, retry later");
        assert_eq!(classifier.classify(&err), ErrorVerdict::Retryable);
    }

    #[test]
    fn test_unmatched_error_is_unknown() {
        let classifier = ErrorClassifier::new();
        let err = io_error("segmentation fault adjacent mystery");
        assert_eq!(classifier.classify(&err), ErrorVerdict::Unknown);
    }

    #[test]
    fn test_caller_rules_win_over_builtins() {
        let classifier = ErrorClassifier::new().with_rule(ClassificationRule::message_contains(
            "timeout_is_fatal_here",
            &["timeout"],
            ErrorVerdict::Terminal,
        ));
        let err = io_error("upstream timeout");
        assert_eq!(classifier.classify(&err), ErrorVerdict::Terminal);
    }

    #[test]
    fn test_first_match_wins_among_caller_rules() {
        let classifier = ErrorClassifier::with_rules(vec![
            ClassificationRule::message_contains("first", &["flaky"], ErrorVerdict::Retryable),
            ClassificationRule::message_contains("second", &["flaky"], ErrorVerdict::Terminal),
        ]);
        let err = io_error("flaky widget");
        assert_eq!(classifier.classify(&err), ErrorVerdict::Retryable);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let classifier = ErrorClassifier::new();
        let err = io_error("connection refused");
        let first = classifier.classify(&err);
        let second = classifier.classify(&err);
        assert_eq!(first, second);
        assert_eq!(first, ErrorVerdict::Retryable);
    }

    #[test]
    fn test_panicking_rule_forces_unknown() {
        let classifier = ErrorClassifier::new().with_rule(ClassificationRule::predicate(
            "explodes",
            |_| panic!("rule blew up"),
            ErrorVerdict::Retryable,
        ));
        let err = io_error("anything at all");
        assert_eq!(classifier.classify(&err), ErrorVerdict::Unknown);
    }

    #[test]
    fn test_transport_error_found_through_anyhow_chain() {
        let classifier = ErrorClassifier::new();
        let err = anyhow::Error::new(TransportError::Throttled {
            retry_after: Some(Duration::from_millis(500)),
        })
        .context("sending status update");
        assert_eq!(classifier.classify_any(&err), ErrorVerdict::Retryable);
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(ErrorVerdict::Retryable.as_str(), "retryable");
        assert_eq!(ErrorVerdict::Terminal.as_str(), "terminal");
        assert_eq!(ErrorVerdict::Unknown.as_str(), "unknown");
        assert!(ErrorVerdict::Retryable.is_retryable());
        assert!(!ErrorVerdict::Unknown.is_retryable());
    }
}
