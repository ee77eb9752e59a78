//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-auth`, `core-runtime`, `bridge-traits`). Host
//! applications can depend on `stream-companion` and enable the documented
//! features without needing to wire each crate individually.
//!
//! The `desktop-shims` feature (default) lets [`core_runtime::config::CoreConfig`]
//! fall back to the `bridge-desktop` adapters for any bridge the host does not
//! inject.

pub use bridge_traits;
pub use core_auth;
pub use core_runtime;
