//! Browser Authorization Session Abstraction
//!
//! The host owns the browser. The core hands it an authorization URL and
//! waits for the redirect flow to finish; the host reports how it ended and,
//! on success, the parameters the identity provider put on the redirect URL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::error::{BridgeError, Result};

/// Request handed to [`AuthSessionLauncher::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSessionRequest {
    /// Fully-built authorization URL to open in the browser
    pub auth_url: String,
    /// URL the provider redirects back to; the flow completes when it is hit
    pub return_url: String,
}

impl AuthSessionRequest {
    pub fn new(auth_url: impl Into<String>, return_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            return_url: return_url.into(),
        }
    }
}

/// Outcome of a browser authorization session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSessionResult {
    /// The provider redirected back to the return URL.
    Success {
        /// Parameters from the redirect URL (query and fragment merged)
        params: HashMap<String, String>,
        /// The redirect URL as received
        url: String,
    },
    /// The provider redirected back with an OAuth error.
    Error {
        params: HashMap<String, String>,
        error_code: Option<String>,
    },
    /// The user cancelled the browser session.
    Cancel,
    /// The browser was closed, or the session timed out, without a redirect.
    Dismiss,
    /// Another authorization session is already open.
    Locked,
}

impl AuthSessionResult {
    /// Classify a redirect URL the way providers report OAuth outcomes:
    /// an `error` parameter yields [`AuthSessionResult::Error`], anything else
    /// is a success carrying every parameter.
    pub fn from_redirect_url(url: &str) -> Result<Self> {
        let params = parse_redirect_params(url)?;
        match params.get("error").cloned() {
            Some(code) => Ok(AuthSessionResult::Error {
                params,
                error_code: Some(code),
            }),
            None => Ok(AuthSessionResult::Success {
                params,
                url: url.to_string(),
            }),
        }
    }

    /// Short tag naming the outcome (`success`, `error`, `cancel`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            AuthSessionResult::Success { .. } => "success",
            AuthSessionResult::Error { .. } => "error",
            AuthSessionResult::Cancel => "cancel",
            AuthSessionResult::Dismiss => "dismiss",
            AuthSessionResult::Locked => "locked",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuthSessionResult::Success { .. })
    }
}

impl fmt::Display for AuthSessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Collect the parameters of a redirect URL.
///
/// Implicit-grant providers return the token in the URL fragment while errors
/// usually arrive in the query string, so both are read. Fragment values win
/// on duplicate keys.
pub fn parse_redirect_params(url: &str) -> Result<HashMap<String, String>> {
    let parsed = Url::parse(url).map_err(|e| BridgeError::InvalidRedirect(e.to_string()))?;

    let mut params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

    if let Some(fragment) = parsed.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }

    Ok(params)
}

/// Browser redirect helper
///
/// Implementations open the authorization URL in a system browser or web view
/// and suspend until the provider redirects to the return URL, the user
/// cancels, or the session is dismissed.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::auth_session::{AuthSessionLauncher, AuthSessionRequest};
///
/// async fn authorize(launcher: &dyn AuthSessionLauncher, url: String) {
///     let request = AuthSessionRequest::new(url, launcher.redirect_uri());
///     let result = launcher.start(request).await;
/// }
/// ```
#[async_trait]
pub trait AuthSessionLauncher: Send + Sync {
    /// Redirect URI registered with the identity provider for this host.
    fn redirect_uri(&self) -> String;

    /// Run the browser flow to completion.
    ///
    /// Cancellation and dismissal are reported as results, not errors.
    /// Errors mean the browser could not be driven at all.
    async fn start(&self, request: AuthSessionRequest) -> Result<AuthSessionResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_params() {
        let params = parse_redirect_params(
            "https://auth.example.com/callback#access_token=tok1&scope=openid&state=xyz&token_type=bearer",
        )
        .unwrap();

        assert_eq!(params.get("access_token"), Some(&"tok1".to_string()));
        assert_eq!(params.get("state"), Some(&"xyz".to_string()));
        assert_eq!(params.get("token_type"), Some(&"bearer".to_string()));
    }

    #[test]
    fn test_parse_query_params_decodes_values() {
        let params = parse_redirect_params(
            "http://localhost:3000/?error=access_denied&error_description=The+user+denied+you+access&state=abc",
        )
        .unwrap();

        assert_eq!(params.get("error"), Some(&"access_denied".to_string()));
        assert_eq!(
            params.get("error_description"),
            Some(&"The user denied you access".to_string())
        );
    }

    #[test]
    fn test_parse_invalid_url() {
        assert!(matches!(
            parse_redirect_params("not a url"),
            Err(BridgeError::InvalidRedirect(_))
        ));
    }

    #[test]
    fn test_result_from_redirect_url() {
        let success =
            AuthSessionResult::from_redirect_url("http://localhost/#access_token=t&state=s")
                .unwrap();
        assert!(success.is_success());
        assert_eq!(success.kind(), "success");

        let error = AuthSessionResult::from_redirect_url("http://localhost/?error=access_denied")
            .unwrap();
        match error {
            AuthSessionResult::Error { error_code, .. } => {
                assert_eq!(error_code.as_deref(), Some("access_denied"));
            }
            other => panic!("Expected error result, got {other}"),
        }
    }

    #[test]
    fn test_result_kind_display() {
        assert_eq!(AuthSessionResult::Cancel.to_string(), "cancel");
        assert_eq!(AuthSessionResult::Dismiss.to_string(), "dismiss");
        assert_eq!(AuthSessionResult::Locked.to_string(), "locked");
        assert!(!AuthSessionResult::Cancel.is_success());
    }
}
