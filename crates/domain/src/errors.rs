//! Error types used throughout the client
//!
//! Provides error classification for session and API operations with
//! retry metadata: auth failures carry a reason so the host can tell a
//! password problem from a provider-API mismatch.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why an authentication attempt (or a reauthenticated retry) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    /// The provider explicitly rejected the supplied credentials.
    /// Fatal for the current credentials; the host must prompt for new
    /// ones.
    CredentialsRejected,
    /// Login succeeded at the transport level but an expected token
    /// could not be located in the response. The integration's
    /// assumptions about the provider no longer hold.
    ProtocolChanged,
    /// The single internal retry after invalidating the session also
    /// hit an auth-failure signal. Same remedy as
    /// `CredentialsRejected`, kept distinct for diagnostics.
    ReauthFailed,
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CredentialsRejected => write!(f, "credentials rejected"),
            Self::ProtocolChanged => write!(f, "provider protocol changed"),
            Self::ReauthFailed => write!(f, "reauthentication failed"),
        }
    }
}

/// Main error type for envoyweb operations
///
/// `Clone` so one failure outcome can be handed to every caller that
/// was waiting on the same in-flight operation.
#[derive(Debug, Clone, Error)]
pub enum EnvoyWebError {
    /// Caller input rejected before any network call was made.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Authentication failure; see [`AuthFailureReason`].
    #[error("Authentication failed ({reason}): {message}")]
    Auth { reason: AuthFailureReason, message: String },

    /// A network call exceeded its deadline. Transient; carries no
    /// information about credential validity, so the session is kept.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-auth HTTP failure or malformed body. Not retried: retrying
    /// a PUT here could cause duplicate writes.
    #[error("Unexpected response (status {status:?}): {detail}")]
    UnexpectedResponse { status: Option<u16>, detail: String },

    /// Transport-level failure other than a timeout (connect, DNS).
    #[error("Network error: {0}")]
    Network(String),
}

impl EnvoyWebError {
    /// Shorthand constructor for auth failures.
    pub fn auth(reason: AuthFailureReason, message: impl Into<String>) -> Self {
        Self::Auth { reason, message: message.into() }
    }

    /// The auth failure reason, if this is an auth failure.
    pub fn auth_reason(&self) -> Option<AuthFailureReason> {
        match self {
            Self::Auth { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the host should prompt for fresh credentials before
    /// trying again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self.auth_reason(),
            Some(AuthFailureReason::CredentialsRejected | AuthFailureReason::ReauthFailed)
        )
    }

    /// Whether a higher layer (e.g. the next poll cycle) may simply
    /// retry this operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// Result type alias for envoyweb operations
pub type Result<T> = std::result::Result<T, EnvoyWebError>;
