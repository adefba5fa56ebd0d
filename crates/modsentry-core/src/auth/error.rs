use thiserror::Error;

/// Failure kinds of the session subsystem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Client-side check failed; nothing was sent
    #[error("{0}")]
    Validation(String),

    /// The server rejected the supplied credentials or registration data
    #[error("{0}")]
    Credential(String),

    /// The server could not be reached
    #[error("{0}")]
    Network(String),

    /// Refreshing the access token failed and the session was torn down
    #[error("Session expired - please log in again")]
    SessionExpired,
}

impl AuthError {
    /// Whether repeating the same operation later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}
