pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/csrf                                       issue CSRF token
/// /auth/login                                      login
/// /auth/registration                               create account
/// /auth/refresh                                    rotate tokens
/// /auth/logout                                     revoke and clear cookies
/// /auth/me                                         current user
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/auth", auth::router())
}
