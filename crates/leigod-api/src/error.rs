//! Error types for vendor API operations

/// Errors from vendor API operations.
///
/// Only `AuthInvalid` carries the token-clearing side effect; `Transport`,
/// `Parse` and `VendorRejected` are transient — the token is retained and
/// the next scheduled cycle retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed vendor response: {0}")]
    Parse(String),

    #[error("vendor rejected request (code {code}): {message}")]
    VendorRejected { code: i64, message: String },

    #[error("account token invalid: {0}")]
    AuthInvalid(String),

    #[error("no account token held")]
    InvalidToken,

    #[error("account is already paused")]
    AlreadyPaused,
}

impl Error {
    /// Whether this failure cleared the session token. The scheduler
    /// transitions to Idle when a cycle hits one of these.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::AuthInvalid(_) | Error::InvalidToken)
    }
}

/// Result alias for vendor API operations.
pub type Result<T> = std::result::Result<T, Error>;
