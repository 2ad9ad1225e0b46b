//! Error taxonomy surfaced to service facades and their callers

/// Errors from an authenticated API call.
///
/// The client recovers locally only from a single 401 (refresh + replay).
/// Everything else propagates unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Transport failure or timeout; no response was received.
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },

    /// The server answered with a non-2xx status, or a 2xx body that did
    /// not match the expected shape.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The refresh attempt failed and the session was cleared. The caller
    /// must log in again.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// Caller input rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// The credential store could not be read or written.
    #[error("credential store error: {0}")]
    Credential(String),
}

impl Error {
    /// HTTP status for `Remote` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network { timeout: true, .. })
    }
}

impl From<auth_store::Error> for Error {
    fn from(err: auth_store::Error) -> Self {
        Error::Credential(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network {
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
