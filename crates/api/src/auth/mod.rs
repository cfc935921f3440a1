//! Identity and session control: signed tokens, refresh rotation, CSRF
//! double-submit, password hashing, and the flows that combine them.

pub mod cookies;
pub mod csrf;
pub mod error;
pub mod fingerprint;
pub mod jwt;
pub mod password;
pub mod rotation;
pub mod service;

pub use error::AuthError;
pub use service::AuthService;
