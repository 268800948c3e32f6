//! Error types for the tutoring core
//!
//! The memory model itself never fails; errors come from configuration lookups,
//! model output that does not match its schema, and the external collaborators.

use thiserror::Error;

/// Errors surfaced by the tutor, prompt builder and session layer
#[derive(Error, Debug)]
pub enum TutorError {
    /// Unknown mode, target language or role key
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model output did not parse into the expected shape
    #[error("Malformed {expected} response: {reason}")]
    MalformedResponse {
        expected: &'static str,
        reason: String,
    },

    /// Chat-completion provider failed (transport, HTTP status, ...)
    #[error("Provider error: {0:#}")]
    Provider(#[source] anyhow::Error),

    /// Persisted key-value store failed
    #[error("Storage error: {0:#}")]
    Storage(#[source] anyhow::Error),

    /// Session precondition not met
    #[error("Session error: {0}")]
    Session(String),
}

impl TutorError {
    pub fn malformed(expected: &'static str, reason: impl Into<String>) -> Self {
        TutorError::MalformedResponse {
            expected,
            reason: reason.into(),
        }
    }

    /// Whether the last-known-good snapshot is guaranteed untouched
    pub fn is_external(&self) -> bool {
        matches!(self, TutorError::Provider(_) | TutorError::MalformedResponse { .. })
    }
}

pub type TutorResult<T> = std::result::Result<T, TutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TutorError::Configuration("unknown mode 'karaoke'".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown mode 'karaoke'");

        let err = TutorError::malformed("feedback", "missing field `strengths`");
        assert_eq!(
            err.to_string(),
            "Malformed feedback response: missing field `strengths`"
        );
        assert!(err.is_external());
    }

    #[test]
    fn test_provider_error_keeps_context() {
        let inner = anyhow::anyhow!("connection refused").context("Failed to send request");
        let err = TutorError::Provider(inner);
        assert!(err.to_string().contains("connection refused"));
        assert!(!TutorError::Session("x".into()).is_external());
    }
}
