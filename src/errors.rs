use thiserror::Error;

/// The central error type for the remsync crate.
///
/// This hierarchy enables programmatic recovery and unified error handling
/// across the client, cache, dispatch, and scheduler layers.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure classes surfaced by the HTTP layer.
///
/// `AuthExpired` is deliberately its own variant rather than a status code:
/// callers must special-case it (stop polling, drop the session) instead of
/// treating it as a generic failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Session expired")]
    AuthExpired,

    #[error("Request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// A mutation was submitted while another was still in flight. Purely
    /// client-side; no request was made.
    #[error("A request is already in progress")]
    InFlight,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether the user re-triggering the action can reasonably succeed.
    ///
    /// Network, timeout, and server-side failures are retryable; an expired
    /// session and a validation rejection are not (the former needs a new
    /// login, the latter a corrected input).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::Server { .. } | Self::Parse(_)
        )
    }

    /// The message to surface to the user, verbatim for validation failures
    /// and already-generic for the rest.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Check if an anyhow error carries an expired-session signal anywhere in
/// its chain, whether wrapped as `SyncError` or held directly.
pub fn is_auth_expired(e: &anyhow::Error) -> bool {
    if let Some(SyncError::Api(ApiError::AuthExpired)) = e.downcast_ref::<SyncError>() {
        return true;
    }
    matches!(e.downcast_ref::<ApiError>(), Some(ApiError::AuthExpired))
}
