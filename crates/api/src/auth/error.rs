use battlecards_db::DbError;

use super::csrf::CsrfError;
use super::jwt::TokenError;
use super::password::PasswordError;

/// Failures of the authentication flows.
///
/// A failed login never says whether the login or the password was wrong.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("token expired")]
    TokenExpired,

    #[error("token invalid")]
    TokenInvalid,

    #[error("CSRF check failed: {0}")]
    CsrfRejected(#[from] CsrfError),

    #[error("login is already taken")]
    Conflict,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid => Self::TokenInvalid,
            TokenError::Encode(e) => Self::Internal(format!("token generation error: {e}")),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        Self::Internal(e.to_string())
    }
}
