use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The browser session ended without a usable redirect.
    #[error("Authorization {kind}: {reason}")]
    AuthorizationFailed { kind: String, reason: String },

    #[error("Anti-forgery state mismatch")]
    StateMismatch { expected: String, actual: String },

    #[error("Redirect is missing the '{0}' parameter")]
    MissingParameter(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Profile unavailable: {0}")]
    ProfileUnavailable(String),

    #[error("Another sign-in or sign-out is in progress")]
    OperationInProgress,

    /// A sign-out ran while the sign-in was waiting; its result was dropped.
    #[error("Sign-in was interrupted by a sign-out")]
    Interrupted,

    #[error("Token revocation failed: {0}")]
    RevocationFailed(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether trying the same operation again may succeed.
    ///
    /// User-driven outcomes (cancel, dismiss) and transport failures are
    /// recoverable; a forged redirect or a misconfiguration is not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AuthError::AuthorizationFailed { .. }
            | AuthError::Network(_)
            | AuthError::OperationInProgress
            | AuthError::Interrupted
            | AuthError::RevocationFailed(_) => true,
            AuthError::Api { status, .. } => *status >= 500 || *status == 429,
            AuthError::StateMismatch { .. }
            | AuthError::MissingParameter(_)
            | AuthError::ProfileUnavailable(_)
            | AuthError::Bridge(_)
            | AuthError::Config(_)
            | AuthError::Other(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mismatch_does_not_leak_values() {
        let err = AuthError::StateMismatch {
            expected: "expected-state".to_string(),
            actual: "forged-state".to_string(),
        };
        let message = err.to_string();

        assert_eq!(message, "Anti-forgery state mismatch");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_classification() {
        let cancelled = AuthError::AuthorizationFailed {
            kind: "cancel".to_string(),
            reason: "user cancelled".to_string(),
        };
        assert!(cancelled.is_recoverable());
        assert!(AuthError::Network("timeout".to_string()).is_recoverable());
        assert!(AuthError::Api {
            status: 503,
            body: String::new()
        }
        .is_recoverable());
        assert!(!AuthError::Api {
            status: 401,
            body: String::new()
        }
        .is_recoverable());
        assert!(!AuthError::MissingParameter("access_token".to_string()).is_recoverable());
    }

    #[test]
    fn test_bridge_error_conversion() {
        let err: AuthError = BridgeError::NotAvailable("no browser".to_string()).into();
        assert!(matches!(err, AuthError::Bridge(_)));
        assert!(err.to_string().contains("no browser"));
    }
}
