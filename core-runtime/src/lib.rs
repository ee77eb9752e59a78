//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the authentication core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, the identity provider settings and
//! the event broadcasting used to drive UI loading states.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, IdentityProviderConfig};
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, EventBus, EventStream};
