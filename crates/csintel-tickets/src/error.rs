use csintel_core::error::CsIntelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("ticket not found: {id}")]
    NotFound { id: String },

    /// Testable property #2: more than one open ticket was
    /// observed for a `clinic_key`. This should be unreachable given the
    /// per-key lock plus the partial unique index, so it is logged fatal
    /// rather than repaired automatically.
    #[error("invariant violated: multiple open tickets for clinic_key {clinic_key}")]
    MultipleOpenTickets { clinic_key: String },
}

pub type Result<T> = std::result::Result<T, TicketError>;

impl From<TicketError> for CsIntelError {
    fn from(e: TicketError) -> Self {
        match e {
            TicketError::Database(err) => CsIntelError::Database(err.to_string()),
            TicketError::NotFound { id } => CsIntelError::Validation(format!("ticket not found: {id}")),
            TicketError::MultipleOpenTickets { clinic_key } => {
                CsIntelError::InvariantViolation(format!("multiple open tickets for {clinic_key}"))
            }
        }
    }
}
