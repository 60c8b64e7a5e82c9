//! Enrichment error taxonomy.
//!
//! The remote model is untrusted: it may be unreachable, reject our
//! credentials, answer with an HTML error page, or return text that is not
//! the JSON we asked for. Every failure mode surfaces as a typed variant;
//! nothing from this module panics past the client boundary.

use thiserror::Error;

/// Maximum length of a raw model response carried inside a parse error.
pub const MAX_RAW_RESPONSE_LEN: usize = 500;

#[derive(Error, Debug)]
pub enum EnrichError {
    /// Caller supplied invalid input (typically empty question text).
    #[error("Invalid input: {0}")]
    Input(String),

    /// Credentials are missing or were rejected by the provider.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider rejected the requested model.
    #[error("Model error: {0}")]
    Model(String),

    /// Could not reach the provider.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request exceeded its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The provider answered with something other than its JSON protocol
    /// (e.g. an HTML error page from a proxy).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The provider returned a non-success status with an error payload.
    #[error("Provider API error (status {status}): {payload}")]
    RemoteApi { status: u16, payload: String },

    /// The model reply was not parseable as the requested JSON. Carries
    /// the (truncated) raw response for operator diagnosis.
    #[error("Failed to parse model response: {message}")]
    Parse {
        message: String,
        raw_response: String,
    },
}

impl EnrichError {
    /// The offending raw payload, when this error preserved one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            EnrichError::Parse { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// Truncates a raw model response for safe inclusion in errors and logs.
pub fn truncate_raw_response(raw: &str) -> String {
    if raw.chars().count() > MAX_RAW_RESPONSE_LEN {
        let truncated: String = raw.chars().take(MAX_RAW_RESPONSE_LEN).collect();
        format!("{}... (truncated)", truncated)
    } else {
        raw.to_string()
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_response() {
        assert_eq!(truncate_raw_response("{}"), "{}");
    }

    #[test]
    fn test_truncate_long_response() {
        let long = "x".repeat(700);
        let truncated = truncate_raw_response(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.chars().count() < 600);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        let long = "ä".repeat(600);
        let truncated = truncate_raw_response(&long);
        assert!(truncated.starts_with("ä"));
    }

    #[test]
    fn test_raw_response_accessor() {
        let err = EnrichError::Parse {
            message: "bad json".to_string(),
            raw_response: "<html>".to_string(),
        };
        assert_eq!(err.raw_response(), Some("<html>"));
        assert!(EnrichError::Input("empty".to_string())
            .raw_response()
            .is_none());
    }
}
