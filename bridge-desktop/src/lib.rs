//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides implementations of the bridge traits using
//! desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `AuthSessionLauncher` using `webbrowser` plus a `tiny_http` loopback listener
//! - `AlertPresenter` writing to stderr
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ConsoleAlertPresenter, LoopbackAuthSession, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let launcher = LoopbackAuthSession::new(3000)?;
//!     let alerts = ConsoleAlertPresenter;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod alert;
mod auth_session;
mod http;

pub use alert::ConsoleAlertPresenter;
pub use auth_session::LoopbackAuthSession;
pub use http::ReqwestHttpClient;
