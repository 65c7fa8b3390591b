use csintel_core::error::CsIntelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("events error: {0}")]
    Events(#[from] csintel_events::EventError),
    #[error("tickets error: {0}")]
    Tickets(#[from] csintel_tickets::TicketError),
    #[error("provider error: {0}")]
    Provider(#[from] csintel_classifier::ProviderError),
    #[error("a learning run is already in progress")]
    AlreadyRunning,
    #[error("execution not found: {id}")]
    ExecutionNotFound { id: String },
    #[error("understanding version not found: {version}")]
    UnderstandingNotFound { version: u32 },
}

pub type Result<T> = std::result::Result<T, LearningError>;

impl From<LearningError> for CsIntelError {
    fn from(e: LearningError) -> Self {
        match e {
            LearningError::AlreadyRunning => CsIntelError::Validation("learning run already in progress".into()),
            LearningError::ExecutionNotFound { id } => {
                CsIntelError::Validation(format!("learning execution not found: {id}"))
            }
            LearningError::UnderstandingNotFound { version } => {
                CsIntelError::Validation(format!("understanding version not found: {version}"))
            }
            other => CsIntelError::Internal(other.to_string()),
        }
    }
}
