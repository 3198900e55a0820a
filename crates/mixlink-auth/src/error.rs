//! Caller-facing pairing and session errors

use crate::storage::StorageError;
use thiserror::Error;

/// Outcome of a failed pairing or authentication step
///
/// Messages stay generic so they never reveal why a lookup failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid pairing code")]
    PairingCodeInvalid,
    #[error("Pairing code expired")]
    PairingCodeExpired,
    #[error("Too many pairing attempts, try again later")]
    PairingRateLimited,
    #[error("Invalid session")]
    SessionInvalid,
    #[error("Session expired")]
    SessionExpired,
    #[error("Maximum number of sessions reached")]
    SessionLimitReached,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for pairing and session operations
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Stable machine-readable code for wire responses
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::PairingCodeInvalid => "pairing_code_invalid",
            AuthError::PairingCodeExpired => "pairing_code_expired",
            AuthError::PairingRateLimited => "pairing_rate_limited",
            AuthError::SessionInvalid => "session_invalid",
            AuthError::SessionExpired => "session_expired",
            AuthError::SessionLimitReached => "session_limit_reached",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Storage(_) => "internal_error",
        }
    }
}
