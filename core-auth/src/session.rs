//! # Authentication Session
//!
//! Owns the signed-in user, the access token and the loading status, and
//! drives the implicit grant flow through the host bridges.
//!
//! ## Overview
//!
//! ```text
//! sign_in:  build URL -> browser session -> check state -> store token
//!           -> GET /users -> store user
//! sign_out: revoke token (best effort) -> clear user and token
//! ```
//!
//! Every failure during sign-in is reported once through the
//! [`AlertPresenter`] and returned to the caller. A sign-in cut short by a
//! sign-out is returned without an alert. Sign-out never fails.
//!
//! Consumers should depend on [`AuthProvider`] rather than the concrete
//! session so screens can be tested against a fake.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthProvider, AuthSession};
//! use core_runtime::{config::CoreConfig, events::EventBus};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoreConfig::builder().build()?;
//! let auth: Arc<dyn AuthProvider> = Arc::new(AuthSession::new(config, EventBus::default()));
//!
//! let profile = auth.sign_in().await?;
//! println!("Welcome, {}", profile.display_name);
//!
//! auth.sign_out().await;
//! # Ok(())
//! # }
//! ```

use crate::api::ApiClient;
use crate::error::{AuthError, Result};
use crate::oauth::ImplicitGrantFlow;
use crate::types::{AccessToken, AuthStatus, SessionSnapshot, UserProfile};
use async_trait::async_trait;
use bridge_traits::auth_session::{AuthSessionLauncher, AuthSessionRequest};
use bridge_traits::http::{HttpMethod, HttpRequest};
use bridge_traits::AlertPresenter;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, EventStream};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

const SIGN_IN_ALERT_TITLE: &str = "Sign-in failed";

/// Authentication capability handed to the UI.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Run the browser flow and fetch the user's profile.
    ///
    /// Failures have already been shown to the user when this returns `Err`,
    /// except [`AuthError::OperationInProgress`] and [`AuthError::Interrupted`].
    async fn sign_in(&self) -> Result<UserProfile>;

    /// Revoke the token if there is one and clear the session.
    async fn sign_out(&self);

    /// Current user, token and status.
    async fn snapshot(&self) -> SessionSnapshot;

    /// Build an API request carrying the current credential, if any.
    async fn authorized_request(&self, method: HttpMethod, path: &str) -> HttpRequest;
}

#[derive(Default)]
struct SessionState {
    user: Option<UserProfile>,
    token: Option<AccessToken>,
    status: AuthStatus,
    /// Bumped by every sign-out; a sign-in started under an older value
    /// must not write its results.
    epoch: u64,
}

pub struct AuthSession {
    flow: ImplicitGrantFlow,
    api: ApiClient,
    launcher: Arc<dyn AuthSessionLauncher>,
    alerts: Arc<dyn AlertPresenter>,
    event_bus: EventBus,
    state: RwLock<SessionState>,
}

impl AuthSession {
    pub fn new(config: CoreConfig, event_bus: EventBus) -> Self {
        let flow = ImplicitGrantFlow::new(
            config.identity_provider.clone(),
            Arc::clone(&config.http_client),
        );
        let api = ApiClient::from_config(&config.identity_provider, config.http_client);

        Self {
            flow,
            api,
            launcher: config.auth_session,
            alerts: config.alert_presenter,
            event_bus,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Subscribe to this session's auth events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// API client for calls outside the session's own flow.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[instrument(skip(self), fields(provider = %self.flow.config().name))]
    async fn sign_in_inner(&self) -> Result<UserProfile> {
        let epoch = {
            let mut state = self.state.write().await;
            if state.status.is_busy() {
                warn!(status = %state.status, "Sign-in rejected, another operation is running");
                return Err(AuthError::OperationInProgress);
            }
            state.status = AuthStatus::SigningIn;
            state.epoch
        };

        info!("Initiating sign-in flow");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningIn {
            provider: self.flow.config().name.clone(),
        }));

        let result = self.authorize_and_fetch(epoch).await;

        {
            let mut state = self.state.write().await;
            if state.epoch == epoch && state.status == AuthStatus::SigningIn {
                state.status = AuthStatus::Idle;
            }
        }

        match &result {
            Ok(profile) => {
                info!(user_id = %profile.id, "Sign-in completed");
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
                    user_id: profile.id.clone(),
                    display_name: profile.display_name.clone(),
                }));
            }
            Err(err) => {
                error!(error = %err, "Sign-in failed");
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    message: err.to_string(),
                    recoverable: err.is_recoverable(),
                }));
                // A sign-out the user asked for is not worth an alert.
                if !matches!(err, AuthError::Interrupted) {
                    self.present_error(err).await;
                }
            }
        }

        result
    }

    async fn authorize_and_fetch(&self, epoch: u64) -> Result<UserProfile> {
        let redirect_uri = self.launcher.redirect_uri();
        let (auth_url, expected_state) = self.flow.build_authorization_url(&redirect_uri)?;

        let outcome = self
            .launcher
            .start(AuthSessionRequest::new(auth_url, redirect_uri))
            .await?;
        debug!(outcome = outcome.kind(), "Authorization session finished");

        let token = self.flow.complete(outcome, &expected_state)?;

        {
            let mut state = self.state.write().await;
            ensure_current(&state, epoch)?;
            state.token = Some(token.clone());
        }

        // On failure the token stays attached without a user.
        let profile = self.api.fetch_current_user(&token).await?;

        {
            let mut state = self.state.write().await;
            ensure_current(&state, epoch)?;
            state.user = Some(profile.clone());
        }

        Ok(profile)
    }

    async fn present_error(&self, err: &AuthError) {
        if let Err(alert_err) = self.alerts.alert(SIGN_IN_ALERT_TITLE, &err.to_string()).await {
            warn!(error = %alert_err, "Failed to present sign-in error");
        }
    }

    #[instrument(skip(self))]
    async fn sign_out_inner(&self) {
        let (epoch, token, user_id) = {
            let mut state = self.state.write().await;
            state.status = AuthStatus::SigningOut;
            state.epoch += 1;
            (
                state.epoch,
                state.token.clone(),
                state.user.as_ref().map(|user| user.id.clone()),
            )
        };

        info!("Signing out");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningOut {
            user_id: user_id.clone(),
        }));

        let revoked = match token {
            Some(token) => match self.flow.revoke_token(&token).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "Token revocation failed, clearing session anyway");
                    false
                }
            },
            None => {
                debug!("No token to revoke");
                false
            }
        };

        {
            let mut state = self.state.write().await;
            state.user = None;
            state.token = None;
            if state.epoch == epoch {
                state.status = AuthStatus::Idle;
            }
        }

        info!(revoked = revoked, "Signed out");
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedOut { user_id, revoked }));
    }
}

fn ensure_current(state: &SessionState, epoch: u64) -> Result<()> {
    if state.epoch != epoch {
        return Err(AuthError::Interrupted);
    }
    Ok(())
}

#[async_trait]
impl AuthProvider for AuthSession {
    async fn sign_in(&self) -> Result<UserProfile> {
        self.sign_in_inner().await
    }

    async fn sign_out(&self) {
        self.sign_out_inner().await
    }

    async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            user: state.user.clone(),
            token: state.token.clone(),
            status: state.status,
        }
    }

    async fn authorized_request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let state = self.state.read().await;
        self.api.request(method, path, state.token.as_ref())
    }
}
