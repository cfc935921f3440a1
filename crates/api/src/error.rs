use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use battlecards_db::DbError;
use serde_json::json;

use crate::auth::AuthError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`AuthError`] for the authentication flows and [`DbError`] for
/// persistence. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failure from one of the authentication flows.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A persistence error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- Authentication errors ---
            AppError::Auth(auth) => classify_auth_error(auth),

            // --- Database errors ---
            AppError::Database(err) => classify_db_error(err),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an [`AuthError`] to its client-facing status, code, and message.
///
/// Credential and session failures share one message so a client cannot tell
/// which check failed. CSRF kinds are logged but collapse to one response.
fn classify_auth_error(err: &AuthError) -> (StatusCode, &'static str, String) {
    match err {
        AuthError::AuthenticationFailed => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication failed".to_string(),
        ),
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "TOKEN_EXPIRED",
            "Access token expired".to_string(),
        ),
        AuthError::TokenInvalid => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication failed".to_string(),
        ),
        AuthError::CsrfRejected(kind) => {
            tracing::warn!(reason = %kind, "CSRF check failed");
            (
                StatusCode::FORBIDDEN,
                "CSRF_REJECTED",
                "CSRF validation failed".to_string(),
            )
        }
        AuthError::Conflict => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Login is already taken".to_string(),
        ),
        AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        AuthError::Storage(db) => classify_db_error(db),
        AuthError::Internal(msg) => internal("Internal auth error", msg),
    }
}

/// Classify a persistence error into an HTTP status, error code, and message.
fn classify_db_error(err: &DbError) -> (StatusCode, &'static str, String) {
    match err {
        DbError::Sqlx(e) => classify_sqlx_error(e),
        DbError::UniqueViolation(constraint) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate value violates unique constraint: {constraint}"),
        ),
        DbError::StaleWrite => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Resource was modified concurrently".to_string(),
        ),
        DbError::SessionClosed => internal("Database error", &err.to_string()),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            internal("Database error", &db_err.to_string())
        }
        other => internal("Database error", &other.to_string()),
    }
}

fn internal(context: &'static str, detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
