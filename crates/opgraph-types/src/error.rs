use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier `{value}`: {reason}")]
    InvalidId { value: String, reason: String },

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("invalid import token: {0}")]
    InvalidToken(String),
}
