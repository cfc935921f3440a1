//! Shared building blocks for the battle cards backend.
//!
//! - [`types`] -- primary key and timestamp aliases.
//! - [`roles`] -- role name constants.
//! - [`scope`] -- request-scoped resource lifetimes and the [`scope::Closeable`] capability.

pub mod roles;
pub mod scope;
pub mod types;
