//! # Core Configuration Module
//!
//! Provides configuration management for the authentication core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the identity provider settings and the host bridges the
//! session depends on. It enforces fail-fast validation so a misconfigured
//! client id or a missing bridge surfaces at startup, not at the first
//! sign-in.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Revocation and profile requests (desktop default: reqwest)
//! - `AuthSessionLauncher` - Browser redirect flow (desktop default: loopback listener)
//! - `AlertPresenter` - Sign-in error reporting (desktop default: stderr)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ### Basic Configuration with Desktop Defaults
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! // Reads CLIENT_ID from the environment (or a .env file)
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Configuration with Custom Bridges
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, IdentityProviderConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .identity_provider(IdentityProviderConfig::twitch("abc123"))
//!     .http_client(Arc::new(MyHttpClient))
//!     .auth_session(Arc::new(MyAuthSession))
//!     .alert_presenter(Arc::new(MyAlerts))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{AlertPresenter, AuthSessionLauncher, HttpClient};
use std::sync::Arc;
use url::Url;

/// Environment variable holding the registered application's client id.
pub const CLIENT_ID_ENV: &str = "CLIENT_ID";

pub const TWITCH_AUTHORIZATION_ENDPOINT: &str = "https://id.twitch.tv/oauth2/authorize";
pub const TWITCH_REVOCATION_ENDPOINT: &str = "https://id.twitch.tv/oauth2/revoke";
pub const TWITCH_API_BASE_URL: &str = "https://api.twitch.tv/helix";
pub const TWITCH_DEFAULT_SCOPES: &[&str] = &["openid", "user:read:email", "user:read:follows"];

/// Port the desktop loopback listener binds when no launcher is injected.
pub const DEFAULT_REDIRECT_PORT: u16 = 3000;

/// Settings for the OAuth identity provider and its REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderConfig {
    /// Display name used in logs and events
    pub name: String,
    /// Registered application client id
    pub client_id: String,
    pub authorization_endpoint: String,
    pub revocation_endpoint: String,
    /// Base URL for profile requests; `/users` is appended
    pub api_base_url: String,
    pub scopes: Vec<String>,
    /// Ask the provider to show the consent page even if already granted
    pub force_verify: bool,
}

impl IdentityProviderConfig {
    /// Twitch endpoints and scopes for the given client id.
    pub fn twitch(client_id: impl Into<String>) -> Self {
        Self {
            name: "Twitch".to_string(),
            client_id: client_id.into(),
            authorization_endpoint: TWITCH_AUTHORIZATION_ENDPOINT.to_string(),
            revocation_endpoint: TWITCH_REVOCATION_ENDPOINT.to_string(),
            api_base_url: TWITCH_API_BASE_URL.to_string(),
            scopes: TWITCH_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            force_verify: true,
        }
    }

    /// Twitch settings with the client id taken from `CLIENT_ID`.
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the process environment win.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let client_id = std::env::var(CLIENT_ID_ENV).map_err(|_| {
            Error::Config(format!(
                "{} is not set. Register an application with the identity provider \
                 and export its client id.",
                CLIENT_ID_ENV
            ))
        })?;

        Ok(Self::twitch(client_id))
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_force_verify(mut self, force_verify: bool) -> Self {
        self.force_verify = force_verify;
        self
    }

    /// Point the provider at different endpoints (e.g., a local mock server).
    pub fn with_endpoints(
        mut self,
        authorization_endpoint: impl Into<String>,
        revocation_endpoint: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        self.authorization_endpoint = authorization_endpoint.into();
        self.revocation_endpoint = revocation_endpoint.into();
        self.api_base_url = api_base_url.into();
        self
    }

    /// Space-delimited scope list as sent in the authorization URL.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Validates the provider settings.
    ///
    /// This checks:
    /// - Client id is not blank
    /// - Endpoints are absolute http(s) URLs
    /// - At least one scope is requested
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("Client id cannot be empty".to_string()));
        }

        for (label, value) in [
            ("Authorization endpoint", &self.authorization_endpoint),
            ("Revocation endpoint", &self.revocation_endpoint),
            ("API base URL", &self.api_base_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| Error::Config(format!("{} '{}' is invalid: {}", label, value, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{} must use http or https, got '{}'",
                    label,
                    url.scheme()
                )));
            }
        }

        if self.scopes.is_empty() {
            return Err(Error::Config(
                "At least one scope must be requested".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the authentication core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub identity_provider: IdentityProviderConfig,

    /// HTTP client for revocation and profile requests
    pub http_client: Arc<dyn HttpClient>,

    /// Browser redirect helper
    pub auth_session: Arc<dyn AuthSessionLauncher>,

    /// User-facing alert surface for sign-in failures
    pub alert_presenter: Arc<dyn AlertPresenter>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("identity_provider", &self.identity_provider)
            .field("http_client", &"HttpClient { ... }")
            .field("auth_session", &"AuthSessionLauncher { ... }")
            .field("alert_presenter", &"AlertPresenter { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.identity_provider.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for token revocation and profile requests. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject a URLSession/OkHttp-backed client."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn auth_session_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AuthSessionLauncher".to_string(),
        message: "AuthSessionLauncher implementation is required for the browser redirect flow. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default LoopbackAuthSession. \
                 Mobile: inject ASWebAuthenticationSession or Custom Tabs."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn alert_presenter_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AlertPresenter".to_string(),
        message: "AlertPresenter implementation is required to report sign-in failures. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ConsoleAlertPresenter. \
                 Mobile: inject a native alert dialog."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_auth_session(port: u16) -> Result<Arc<dyn AuthSessionLauncher>> {
    use bridge_desktop::LoopbackAuthSession;

    let session = LoopbackAuthSession::new(port).map_err(|e| {
        Error::Internal(format!(
            "Failed to bind loopback redirect listener on port {}: {}",
            port, e
        ))
    })?;
    let session: Arc<dyn AuthSessionLauncher> = Arc::new(session);
    Ok(session)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_auth_session(_port: u16) -> Result<Arc<dyn AuthSessionLauncher>> {
    Err(auth_session_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_alert_presenter() -> Result<Arc<dyn AlertPresenter>> {
    use bridge_desktop::ConsoleAlertPresenter;

    let presenter: Arc<dyn AlertPresenter> = Arc::new(ConsoleAlertPresenter);
    Ok(presenter)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_alert_presenter() -> Result<Arc<dyn AlertPresenter>> {
    Err(alert_presenter_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Bridges that are not set fall back to the desktop adapters when the
/// `desktop-shims` feature is enabled; otherwise [`build()`](Self::build)
/// reports which capability is missing.
#[derive(Default)]
pub struct CoreConfigBuilder {
    identity_provider: Option<IdentityProviderConfig>,
    client_id: Option<String>,
    redirect_port: Option<u16>,
    http_client: Option<Arc<dyn HttpClient>>,
    auth_session: Option<Arc<dyn AuthSessionLauncher>>,
    alert_presenter: Option<Arc<dyn AlertPresenter>>,
}

impl CoreConfigBuilder {
    /// Sets the identity provider settings.
    ///
    /// If not provided, [`IdentityProviderConfig::from_env`] is used.
    pub fn identity_provider(mut self, config: IdentityProviderConfig) -> Self {
        self.identity_provider = Some(config);
        self
    }

    /// Overrides the client id, whichever way the provider settings were obtained.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().client_id("abc123");
    /// ```
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Port for the default loopback redirect listener.
    ///
    /// Ignored when an `AuthSessionLauncher` is injected. Default: 3000.
    pub fn redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = Some(port);
        self
    }

    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the browser redirect helper.
    pub fn auth_session(mut self, session: Arc<dyn AuthSessionLauncher>) -> Self {
        self.auth_session = Some(session);
        self
    }

    /// Sets the alert presenter.
    pub fn alert_presenter(mut self, presenter: Arc<dyn AlertPresenter>) -> Self {
        self.alert_presenter = Some(presenter);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - No client id was given and `CLIENT_ID` is unset
    /// - Provider settings are invalid
    /// - A bridge is missing and no desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let mut identity_provider = match (self.identity_provider, self.client_id.as_ref()) {
            (Some(config), _) => config,
            (None, Some(client_id)) => IdentityProviderConfig::twitch(client_id.clone()),
            (None, None) => IdentityProviderConfig::from_env()?,
        };

        if let Some(client_id) = self.client_id {
            identity_provider.client_id = client_id;
        }

        // Validate before any bridge is created so a bad client id does not
        // leave a bound listener behind.
        identity_provider.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let auth_session = match self.auth_session {
            Some(session) => session,
            None => provide_default_auth_session(
                self.redirect_port.unwrap_or(DEFAULT_REDIRECT_PORT),
            )?,
        };

        let alert_presenter = match self.alert_presenter {
            Some(presenter) => presenter,
            None => provide_default_alert_presenter()?,
        };

        let config = CoreConfig {
            identity_provider,
            http_client,
            auth_session,
            alert_presenter,
        };

        config.validate()?;

        Ok(config)
    }
}
