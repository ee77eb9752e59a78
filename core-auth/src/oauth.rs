//! OAuth 2.0 Implicit Grant Flow
//!
//! Builds the authorization URL, validates the redirect that comes back from
//! the browser session, and revokes tokens at sign-out.
//!
//! # Overview
//!
//! The implicit grant returns the access token directly on the redirect URL,
//! so there is no code exchange and no refresh token. The flow consists of:
//! - Building the authorization URL with a fresh anti-forgery `state`
//! - Checking the returned `state` before trusting the redirect
//! - Extracting `access_token`
//! - Revoking the token at the provider on sign-out
//!
//! # Security
//!
//! - `state` is 30 alphanumeric characters from a thread-local CSPRNG
//! - A redirect whose `state` does not match yields no token at all
//! - Tokens are never logged
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::ImplicitGrantFlow;
//! use core_runtime::config::IdentityProviderConfig;
//! use std::sync::Arc;
//!
//! # fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let flow = ImplicitGrantFlow::new(IdentityProviderConfig::twitch("abc123"), http_client);
//! let (auth_url, state) = flow.build_authorization_url("http://localhost:3000/callback")?;
//! // Open auth_url in a browser, then pass the redirect result to `complete`
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::AccessToken;
use bridge_traits::auth_session::AuthSessionResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::config::IdentityProviderConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Length of the anti-forgery `state` value.
pub const STATE_LENGTH: usize = 30;

/// Anti-forgery value sent as `state` and expected back on the redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct AntiForgeryState(String);

impl AntiForgeryState {
    /// Generate a fresh 30-character alphanumeric value.
    pub fn generate() -> Self {
        let value: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect();
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against the value returned by the provider.
    pub fn matches(&self, returned: &str) -> bool {
        self.0 == returned
    }
}

impl fmt::Debug for AntiForgeryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AntiForgeryState")
            .field(&format!("{}...", &self.0[..4.min(self.0.len())]))
            .finish()
    }
}

/// OAuth 2.0 implicit grant flow for one identity provider.
pub struct ImplicitGrantFlow {
    config: IdentityProviderConfig,
    http_client: Arc<dyn HttpClient>,
}

impl ImplicitGrantFlow {
    pub fn new(config: IdentityProviderConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &IdentityProviderConfig {
        &self.config
    }

    /// Build the authorization URL with a freshly generated `state`.
    ///
    /// # Returns
    ///
    /// A tuple of (authorization_url, state). Keep the state until the
    /// redirect comes back and pass it to [`complete`](Self::complete).
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization endpoint is not a URL.
    #[instrument(skip(self), fields(provider = %self.config.name))]
    pub fn build_authorization_url(&self, redirect_uri: &str) -> Result<(String, AntiForgeryState)> {
        let state = AntiForgeryState::generate();

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|e| AuthError::Other(format!("Invalid authorization endpoint: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("response_type", "token");
            query.append_pair("scope", &self.config.scope_string());
            if self.config.force_verify {
                query.append_pair("force_verify", "true");
            }
            query.append_pair("state", state.as_str());
        }

        debug!("Built authorization URL for provider {}", self.config.name);

        Ok((url.to_string(), state))
    }

    /// Turn the browser session outcome into an access token.
    ///
    /// # Errors
    ///
    /// - `AuthError::AuthorizationFailed` - the session ended with error, cancel,
    ///   dismiss or locked; no token is produced
    /// - `AuthError::StateMismatch` - the returned `state` is missing or differs
    /// - `AuthError::MissingParameter` - the redirect carries no `access_token`
    #[instrument(skip(self, result, expected), fields(provider = %self.config.name, outcome = result.kind()))]
    pub fn complete(
        &self,
        result: AuthSessionResult,
        expected: &AntiForgeryState,
    ) -> Result<AccessToken> {
        let params = match result {
            AuthSessionResult::Success { params, .. } => params,
            AuthSessionResult::Error { params, error_code } => {
                let reason = describe_provider_error(&params, error_code.as_deref());
                warn!(reason = %reason, "Provider returned an authorization error");
                return Err(AuthError::AuthorizationFailed {
                    kind: "error".to_string(),
                    reason,
                });
            }
            other => {
                let reason = match other {
                    AuthSessionResult::Cancel => "The sign-in was cancelled",
                    AuthSessionResult::Dismiss => "The sign-in window was closed",
                    _ => "Another sign-in window is already open",
                };
                info!(outcome = other.kind(), "Authorization session did not complete");
                return Err(AuthError::AuthorizationFailed {
                    kind: other.kind().to_string(),
                    reason: reason.to_string(),
                });
            }
        };

        let returned_state = params.get("state").map(String::as_str).unwrap_or_default();
        if !expected.matches(returned_state) {
            warn!("OAuth state mismatch for provider {}", self.config.name);
            return Err(AuthError::StateMismatch {
                expected: expected.as_str().to_string(),
                actual: returned_state.to_string(),
            });
        }

        let token = params
            .get("access_token")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::MissingParameter("access_token".to_string()))?;

        info!("Authorization redirect accepted");
        Ok(AccessToken::new(token.clone()))
    }

    /// Revoke `token` at the provider.
    ///
    /// # Errors
    ///
    /// - `AuthError::Network` - the request could not be sent
    /// - `AuthError::RevocationFailed` - the provider answered with a non-2xx status
    #[instrument(skip(self, token), fields(provider = %self.config.name))]
    pub async fn revoke_token(&self, token: &AccessToken) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.revocation_endpoint.clone())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("token", token.secret()),
            ][..])?;

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(
                status = status,
                error = %error_body,
                "Revocation endpoint rejected the token"
            );

            return Err(AuthError::RevocationFailed(format!(
                "Revocation endpoint returned {}: {}",
                status, error_body
            )));
        }

        info!("Access token revoked");
        Ok(())
    }
}

fn describe_provider_error(params: &HashMap<String, String>, error_code: Option<&str>) -> String {
    let code = error_code
        .or_else(|| params.get("error").map(String::as_str))
        .unwrap_or("unknown_error");

    match params.get("error_description") {
        Some(description) if !description.is_empty() => format!("{} ({})", description, code),
        _ => code.to_string(),
    }
}
