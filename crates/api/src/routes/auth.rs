//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// GET  /csrf          -> csrf
/// POST /login         -> login         (CSRF)
/// POST /registration  -> register      (CSRF)
/// POST /refresh       -> refresh       (CSRF)
/// POST /logout        -> logout        (CSRF)
/// GET  /me            -> me            (access token)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/csrf", get(auth::csrf))
        .route("/login", post(auth::login))
        .route("/registration", post(auth::register))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}
