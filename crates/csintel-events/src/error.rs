use csintel_core::error::CsIntelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("event not found: {id}")]
    NotFound { id: String },
}

pub type Result<T> = std::result::Result<T, EventError>;

impl From<EventError> for CsIntelError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::Database(err) => CsIntelError::Database(err.to_string()),
            EventError::Validation(msg) => CsIntelError::Validation(msg),
            EventError::NotFound { id } => CsIntelError::Validation(format!("event not found: {id}")),
        }
    }
}
