//! Handlers for the `/auth` resource (csrf, login, registration, refresh,
//! logout, me).
//!
//! Tokens travel only in cookies. Every mutating handler opens one
//! [`UnitOfWork`] on the request's [`ResourceScope`] and hands it to the
//! matching [`AuthService`](crate::auth::AuthService) flow.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, StatusCode};
use axum::response::AppendHeaders;
use axum::{Extension, Json};
use battlecards_core::scope::ResourceScope;
use battlecards_db::models::user::UserResponse;
use battlecards_db::UnitOfWork;
use serde::Serialize;

use crate::auth::rotation::TokenPair;
use crate::auth::service::{Credentials, Registration};
use crate::error::AppResult;
use crate::middleware::auth::{AuthUser, CsrfSubmission, TokenCookies};
use crate::state::AppState;

/// `Set-Cookie` headers attached to a response.
type SetCookies = AppendHeaders<Vec<(HeaderName, String)>>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response body for `GET /auth/csrf`.
#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    /// Same value as the `csrf_token` cookie; echo it in `X-CSRF-Token`.
    pub csrf_token: String,
}

/// Successful authentication response returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/auth/csrf
///
/// Issue a CSRF token as a script-readable cookie and in the body.
pub async fn csrf(State(state): State<AppState>) -> (SetCookies, Json<CsrfResponse>) {
    let token = state.auth.csrf().issue();
    let cookies = AppendHeaders(vec![(SET_COOKIE, state.cookies.csrf(&token))]);
    (cookies, Json(CsrfResponse { csrf_token: token }))
}

/// POST /api/v1/auth/login
///
/// Authenticate with login + password. Sets the access and refresh cookies.
pub async fn login(
    State(state): State<AppState>,
    Extension(scope): Extension<ResourceScope>,
    csrf: CsrfSubmission,
    Json(input): Json<Credentials>,
) -> AppResult<(SetCookies, Json<AuthResponse>)> {
    let uow = UnitOfWork::open(&state.sessions, &scope).await?;
    let (user, pair) = state.auth.login(uow, csrf.pair(), input).await?;
    Ok(authenticated(&state, &pair, UserResponse::from(&user)))
}

/// POST /api/v1/auth/registration
///
/// Create an account. Returns 201 with the new user; does not log in.
pub async fn register(
    State(state): State<AppState>,
    Extension(scope): Extension<ResourceScope>,
    csrf: CsrfSubmission,
    Json(input): Json<Registration>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let uow = UnitOfWork::open(&state.sessions, &scope).await?;
    let user = state.auth.register(uow, csrf.pair(), input).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// POST /api/v1/auth/refresh
///
/// Exchange the access + refresh cookies for a new pair. The presented
/// refresh token stops working.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(scope): Extension<ResourceScope>,
    csrf: CsrfSubmission,
    tokens: TokenCookies,
) -> AppResult<(SetCookies, Json<AuthResponse>)> {
    let uow = UnitOfWork::open(&state.sessions, &scope).await?;
    let (user, pair) = state
        .auth
        .refresh(
            uow,
            csrf.pair(),
            tokens.access_token.as_deref(),
            tokens.refresh_token.as_deref(),
        )
        .await?;
    Ok(authenticated(&state, &pair, UserResponse::from(&user)))
}

/// POST /api/v1/auth/logout
///
/// Revoke the refresh token (if any) and clear both token cookies.
/// Returns 204 No Content whether or not the caller was logged in.
pub async fn logout(
    State(state): State<AppState>,
    Extension(scope): Extension<ResourceScope>,
    csrf: CsrfSubmission,
    tokens: TokenCookies,
) -> AppResult<(StatusCode, SetCookies)> {
    let uow = UnitOfWork::open(&state.sessions, &scope).await?;
    state
        .auth
        .logout(uow, csrf.pair(), tokens.refresh_token.as_deref())
        .await?;

    let cookies = AppendHeaders(vec![
        (SET_COOKIE, state.cookies.clear_access()),
        (SET_COOKIE, state.cookies.clear_refresh()),
    ]);
    Ok((StatusCode::NO_CONTENT, cookies))
}

/// GET /api/v1/auth/me
///
/// The user the access-token cookie belongs to.
pub async fn me(
    State(state): State<AppState>,
    Extension(scope): Extension<ResourceScope>,
    auth_user: AuthUser,
) -> AppResult<Json<UserResponse>> {
    let uow = UnitOfWork::open(&state.sessions, &scope).await?;
    let user = state.auth.current_user(uow, auth_user.user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn authenticated(
    state: &AppState,
    pair: &TokenPair,
    user: UserResponse,
) -> (SetCookies, Json<AuthResponse>) {
    let cookies = AppendHeaders(vec![
        (SET_COOKIE, state.cookies.access(&pair.access_token)),
        (SET_COOKIE, state.cookies.refresh(&pair.refresh_token)),
    ]);
    let body = AuthResponse {
        expires_in: state.auth.tokens().access_ttl_secs(),
        user,
    };
    (cookies, Json(body))
}
