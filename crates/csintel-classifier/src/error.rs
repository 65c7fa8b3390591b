use csintel_core::error::CsIntelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("events error: {0}")]
    Events(#[from] csintel_events::EventError),

    #[error("tickets error: {0}")]
    Tickets(#[from] csintel_tickets::TicketError),

    #[error("llm provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;

impl From<ClassifierError> for CsIntelError {
    fn from(e: ClassifierError) -> Self {
        CsIntelError::LlmProvider(e.to_string())
    }
}
