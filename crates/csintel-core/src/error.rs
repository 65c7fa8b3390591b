use thiserror::Error;

/// Top-level error enum. Every handler-facing error narrows down to one of
/// these so the ingest endpoint's JSON envelope (`{ok:false, error:{code,
/// message}}`) and the scheduler/classifier logs share one vocabulary.
#[derive(Debug, Error)]
pub enum CsIntelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Ticket invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CsIntelError {
    /// Short error code sent to the collector in the ingest error envelope:
    /// `UNAUTHORIZED|VALIDATION_ERROR|INTERNAL_ERROR` — every other variant
    /// collapses to `INTERNAL_ERROR` on that boundary.
    pub fn code(&self) -> &'static str {
        match self {
            CsIntelError::Unauthorized(_) => "UNAUTHORIZED",
            CsIntelError::Validation(_) => "VALIDATION_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<rusqlite::Error> for CsIntelError {
    fn from(e: rusqlite::Error) -> Self {
        CsIntelError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CsIntelError>;
