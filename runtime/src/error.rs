//! Error taxonomy for detection and audit.

use std::fmt;

/// Failures surfaced by the resolvers and the audit supervisor.
///
/// Only [`DetectError::NotFound`] escapes a resolver; the other variants are
/// recorded while the fallback chain advances. Audit failures never escape
/// the supervisor at all and are kept for logging.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("not found after {}", Attempts(.attempts))]
    NotFound { attempts: Vec<String> },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("audit process exceeded its {budget_ms}ms budget and was killed")]
    ProcessTimeout { budget_ms: u64 },

    #[error("audit process failed: {0}")]
    ProcessFailure(String),

    #[error("browser cleanup failed: {0}")]
    Cleanup(String),
}

impl DetectError {
    pub fn network(e: impl fmt::Display) -> Self {
        Self::Network(e.to_string())
    }

    pub fn parse(e: impl fmt::Display) -> Self {
        Self::Parse(e.to_string())
    }

    /// Machine-readable code for the wire format.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::ProcessTimeout { .. } => "PROCESS_TIMEOUT",
            Self::ProcessFailure(_) => "PROCESS_FAILURE",
            Self::Cleanup(_) => "CLEANUP_FAILURE",
        }
    }
}

impl From<reqwest::Error> for DetectError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<pwa_inspect::ManifestParseError> for DetectError {
    fn from(e: pwa_inspect::ManifestParseError) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Formats an attempt chain as `a; b; c`.
struct Attempts<'a>(&'a [String]);

impl fmt::Display for Attempts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no attempts");
        }
        f.write_str(&self.0.join("; "))
    }
}

pub type DetectResult<T> = Result<T, DetectError>;
