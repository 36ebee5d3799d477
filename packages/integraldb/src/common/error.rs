//! Error taxonomy shared by every pipeline stage.
//!
//! Stages decide per record whether an error is skippable (log, record the
//! skip, move on) or fatal for the whole run. See [`PipelineError::is_skippable`].

use openai_client::{OpenAIError, Retryable};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Postgres SQLSTATE for `foreign_key_violation`.
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Remote service unreachable or rate limited after all retries
    #[error("transient failure: {0}")]
    Transient(String),

    /// Extraction output did not match the expected schema
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// A write referenced a row that does not exist
    #[error("foreign key violation on {constraint}: {message}")]
    ForeignKeyViolation { constraint: String, message: String },

    /// Embedding width differs from the column width
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Missing credentials or malformed settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote service rejected the request (e.g. input too long)
    #[error("remote service error: {0}")]
    Remote(String),

    /// Text could not be read out of a PDF
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Storage(#[source] sqlx::Error),
}

impl PipelineError {
    /// Whether a stage may skip the current record and continue the batch.
    ///
    /// Configuration and storage failures abort the run.
    pub fn is_skippable(&self) -> bool {
        !matches!(self, PipelineError::Config(_) | PipelineError::Storage(_))
    }

    /// Short label persisted alongside skipped records.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transient(_) => "transient",
            PipelineError::SchemaValidation(_) => "schema_validation",
            PipelineError::ForeignKeyViolation { .. } => "foreign_key_violation",
            PipelineError::DimensionMismatch { .. } => "dimension_mismatch",
            PipelineError::Config(_) => "config",
            PipelineError::Remote(_) => "remote",
            PipelineError::Pdf(_) => "pdf",
            PipelineError::Io(_) => "io",
            PipelineError::Storage(_) => "storage",
        }
    }
}

impl Retryable for PipelineError {
    fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(PG_FOREIGN_KEY_VIOLATION) {
                return PipelineError::ForeignKeyViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                    message: db.message().to_string(),
                };
            }
        }
        PipelineError::Storage(err)
    }
}

impl From<OpenAIError> for PipelineError {
    fn from(err: OpenAIError) -> Self {
        match err {
            e if e.is_transient() => PipelineError::Transient(e.to_string()),
            OpenAIError::DimensionMismatch { expected, actual } => {
                PipelineError::DimensionMismatch { expected, actual }
            }
            OpenAIError::Parse(msg) => PipelineError::SchemaValidation(msg),
            OpenAIError::Config(msg) => PipelineError::Config(msg),
            e => PipelineError::Remote(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        let transient = err.is_timeout()
            || err.is_connect()
            || err
                .status()
                .map(|s| s.as_u16() == 429 || s.is_server_error())
                .unwrap_or(false);
        if transient {
            PipelineError::Transient(err.to_string())
        } else {
            PipelineError::Remote(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_errors_map_onto_taxonomy() {
        let rate_limited: PipelineError = OpenAIError::Api {
            status: 429,
            message: "slow down".into(),
        }
        .into();
        assert!(matches!(rate_limited, PipelineError::Transient(_)));

        let too_long: PipelineError = OpenAIError::Api {
            status: 400,
            message: "maximum context length".into(),
        }
        .into();
        assert!(matches!(too_long, PipelineError::Remote(_)));

        let bad_json: PipelineError = OpenAIError::Parse("eof".into()).into();
        assert!(matches!(bad_json, PipelineError::SchemaValidation(_)));

        let narrow: PipelineError = OpenAIError::DimensionMismatch {
            expected: 1536,
            actual: 768,
        }
        .into();
        assert!(matches!(
            narrow,
            PipelineError::DimensionMismatch {
                expected: 1536,
                actual: 768
            }
        ));
    }

    #[test]
    fn test_config_and_storage_errors_are_fatal() {
        assert!(!PipelineError::Config("missing key".into()).is_skippable());
        assert!(!PipelineError::Storage(sqlx::Error::PoolTimedOut).is_skippable());
        assert!(PipelineError::Transient("503".into()).is_skippable());
        assert!(PipelineError::ForeignKeyViolation {
            constraint: "products_supplier_id_fkey".into(),
            message: "insert or update violates".into(),
        }
        .is_skippable());
    }

    #[test]
    fn test_non_database_sqlx_errors_stay_storage() {
        let err: PipelineError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "storage");
    }
}
