use csintel_core::error::CsIntelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("user not found: {id}")]
    NotFound { id: String },
    #[error("email already registered: {email}")]
    DuplicateEmail { email: String },
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type Result<T> = std::result::Result<T, UserError>;

impl From<UserError> for CsIntelError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound { id } => CsIntelError::Validation(format!("user not found: {id}")),
            UserError::DuplicateEmail { email } => CsIntelError::Validation(format!("email already registered: {email}")),
            UserError::InvalidCredentials => CsIntelError::Unauthorized("invalid credentials".into()),
            UserError::Token(e) => CsIntelError::Unauthorized(e.to_string()),
            UserError::Database(e) => CsIntelError::Database(e.to_string()),
            UserError::Hash(msg) => CsIntelError::Internal(msg),
        }
    }
}
