//! User entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use battlecards_core::types::{DbId, Timestamp};

/// Default interface language for new accounts.
pub const DEFAULT_LANGUAGE: &str = "RU";

/// Actor kinds recorded in the `updated_by` audit column.
pub mod actors {
    /// The account owner acting through the API (login, refresh, logout).
    pub const USER: &str = "user";
}

/// Full user row from the `users` table.
///
/// Contains the password hash and refresh fingerprint -- NEVER serialize this
/// to API responses directly. Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub login: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub language: String,
    pub role: String,
    /// Keyed digest of the single refresh token currently allowed to rotate.
    pub refresh_token_hash: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub updated_by: String,
}

/// Safe user representation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub login: String,
    pub email: Option<String>,
    pub language: String,
    pub role: String,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            email: user.email.clone(),
            language: user.language.clone(),
            role: user.role.clone(),
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub login: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub role: String,
    /// Actor recorded in the `updated_by` audit column.
    pub updated_by: String,
}
