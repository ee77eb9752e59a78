//! # Authentication Module
//!
//! Twitch sign-in through the OAuth 2.0 implicit grant.
//!
//! ## Overview
//!
//! [`AuthSession`] opens the provider's consent page through the host's
//! [`AuthSessionLauncher`](bridge_traits::AuthSessionLauncher), validates the
//! anti-forgery `state` on the redirect, fetches the user's profile and keeps
//! the resulting user and token in memory. Sign-out revokes the token on a
//! best-effort basis and clears the session.
//!
//! ## Features
//!
//! - Implicit grant URL construction with a random 30-character state
//! - Per-request bearer credentials (no shared default headers)
//! - A single [`AuthStatus`] instead of separate loading flags
//! - Auth events on the core [`EventBus`](core_runtime::EventBus)
//! - A mockable [`AuthProvider`] trait for UI code

pub mod api;
pub mod error;
pub mod oauth;
pub mod session;
pub mod types;

pub use api::ApiClient;
pub use error::{AuthError, Result};
pub use oauth::{AntiForgeryState, ImplicitGrantFlow, STATE_LENGTH};
pub use session::{AuthProvider, AuthSession};
pub use types::{AccessToken, AuthStatus, SessionSnapshot, UserProfile};
