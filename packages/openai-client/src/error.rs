//! Error types for the OpenAI client.

use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Missing API key or invalid client settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed, timed out, or the body could not be read
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Embedding came back with a different width than requested
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl OpenAIError {
    /// Whether retrying the same request may succeed.
    ///
    /// Network failures, rate limits (429) and server errors (5xx) are
    /// transient. Everything else is a property of the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            OpenAIError::Network(_) => true,
            OpenAIError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            OpenAIError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> OpenAIError {
        OpenAIError::Api {
            status,
            message: "boom".into(),
        }
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        assert!(api(429).is_transient());
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(OpenAIError::Network("reset".into()).is_transient());
    }

    #[test]
    fn test_request_errors_are_not_transient() {
        assert!(!api(400).is_transient());
        assert!(!api(401).is_transient());
        assert!(!OpenAIError::Parse("bad json".into()).is_transient());
        assert!(!OpenAIError::DimensionMismatch {
            expected: 1536,
            actual: 3
        }
        .is_transient());
    }
}
