//! Extractors for the credentials a request carries in cookies and headers.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use battlecards_core::types::DbId;

use crate::auth::cookies::{read_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::csrf::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
use crate::auth::service::CsrfPair;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a valid, unexpired access-token cookie.
///
/// Use this as an extractor parameter in any handler that requires authentication:
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.user_id`).
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, ACCESS_TOKEN_COOKIE);
        let claims = state.auth.authenticate(token.as_deref())?;
        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}

/// The raw token cookies, whether or not they are present or valid.
#[derive(Debug, Clone, Default)]
pub struct TokenCookies {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for TokenCookies {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            access_token: read_cookie(&parts.headers, ACCESS_TOKEN_COOKIE),
            refresh_token: read_cookie(&parts.headers, REFRESH_TOKEN_COOKIE),
        })
    }
}

/// The CSRF cookie and header of a request. Checking them is up to the flow.
#[derive(Debug, Clone, Default)]
pub struct CsrfSubmission {
    pub cookie: Option<String>,
    pub header: Option<String>,
}

impl CsrfSubmission {
    pub fn pair(&self) -> CsrfPair<'_> {
        CsrfPair {
            cookie: self.cookie.as_deref(),
            header: self.header.as_deref(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CsrfSubmission {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            cookie: read_cookie(&parts.headers, CSRF_COOKIE_NAME),
            header: parts
                .headers
                .get(CSRF_HEADER_NAME)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}
