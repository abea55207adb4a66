//! Error types for privilege operations

use thiserror::Error;

/// The main error type for store and gate operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Capability-dependency or required-field violation
    #[error("validation failed: {0}")]
    Validation(String),
    /// Attempted mutation of the default or root privilege
    #[error("protected record: {0}")]
    ProtectedRecord(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Singleton bootstrap invoked after the singleton exists
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Identity authority unreachable or rejecting the call
    #[error("authority unavailable: {0}")]
    AuthorityUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::ProtectedRecord(_) => "protected_record",
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::MissingCredential(_) => "missing_credential",
            Error::Forbidden(_) => "forbidden",
            Error::AuthorityUnavailable(_) => "authority_unavailable",
            Error::Storage(_) => "storage",
        }
    }
}

/// Result type alias for privilege operations
pub type Result<T> = std::result::Result<T, Error>;

/// Convert any lower-level failure into a storage error
pub fn err<E: std::error::Error>(e: E) -> Error {
    Error::Storage(e.to_string())
}
