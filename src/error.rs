//! Error types for the request router
//!
//! Construction-time failures (bad patterns, unreadable state) are fatal and
//! surface through `RouterError`. Per-request stage failures stay internal to
//! the pipeline: each stage has its own error type and the router degrades to
//! the next stage instead of propagating.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Failures that abort startup or a state mutation
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("State error: {message}")]
    State { message: String },
}

impl RouterError {
    /// State mutation failure (version marker, corpus persistence)
    pub fn state<S: Into<String>>(message: S) -> Self {
        Self::State {
            message: message.into(),
        }
    }
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;

/// `key=value` and `key: value` pairs whose value must never be logged
static SECRET_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|token|api[_-]?key|key|secret)[=:]\s*\S+").unwrap()
});

/// Paths under directories that typically hold credentials
static SENSITIVE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/[\w./-]*/(?:secrets?|\.ssh|\.aws|\.config)/[\w./-]+").unwrap());

const MAX_MESSAGE_LEN: usize = 500;
const TRUNCATION_MARK: &str = "...[truncated]";

/// Scrub an upstream error string before it is logged
///
/// Errors from a misconfigured endpoint can embed credentials or local
/// paths, and a runaway response body can flood the log. Redact the obvious
/// secret shapes and cap the length.
pub(crate) fn sanitize_error_message(message: &str) -> String {
    let redacted = SECRET_PAIR.replace_all(message, "${1}=***");
    let redacted = SENSITIVE_PATH.replace_all(&redacted, "/***REDACTED***/");

    if redacted.len() <= MAX_MESSAGE_LEN {
        return redacted.into_owned();
    }

    let mut cut = MAX_MESSAGE_LEN - TRUNCATION_MARK.len();
    while !redacted.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &redacted[..cut], TRUNCATION_MARK)
}
