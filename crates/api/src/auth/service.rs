//! Authentication flows: login, registration, refresh, logout, and
//! current-user resolution.
//!
//! Each flow takes ownership of the [`UnitOfWork`] opened for its request and
//! either commits it or lets it drop (which discards every pending write).

use battlecards_core::roles::ROLE_PLAYER;
use battlecards_core::types::DbId;
use battlecards_db::models::user::{actors, CreateUser, User};
use battlecards_db::{DbError, UnitOfWork};
use serde::Deserialize;
use validator::Validate;

use super::csrf::CsrfGuard;
use super::error::AuthError;
use super::fingerprint::RefreshFingerprinter;
use super::jwt::{Claims, ExpiryCheck, TokenService};
use super::password;
use super::rotation::{RefreshRotation, TokenPair};

/// The double-submit pair carried by one request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfPair<'a> {
    pub cookie: Option<&'a str>,
    pub header: Option<&'a str>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Request body for `POST /auth/registration`.
#[derive(Debug, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 32, message = "login must be 1 to 32 characters"))]
    pub login: String,
    #[validate(length(min = 1, max = 256, message = "password must be 1 to 256 characters"))]
    pub password: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

/// Orchestrates the CSRF guard, token rotation, password hashing and
/// persistence for each authentication flow.
#[derive(Debug, Clone)]
pub struct AuthService {
    csrf: CsrfGuard,
    rotation: RefreshRotation,
}

impl AuthService {
    pub fn new(
        tokens: TokenService,
        fingerprints: RefreshFingerprinter,
        csrf: CsrfGuard,
    ) -> Self {
        Self {
            csrf,
            rotation: RefreshRotation::new(tokens, fingerprints),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        self.rotation.tokens()
    }

    pub fn csrf(&self) -> &CsrfGuard {
        &self.csrf
    }

    /// Authenticate with login + password and start a token session.
    pub async fn login(
        &self,
        mut uow: UnitOfWork,
        csrf: CsrfPair<'_>,
        credentials: Credentials,
    ) -> Result<(User, TokenPair), AuthError> {
        self.csrf.verify(csrf.cookie, csrf.header)?;

        let user = uow.users().find_by_login(&credentials.login).await?;
        let verified = match &user {
            Some(user) => {
                password::verify_password_blocking(
                    credentials.password,
                    user.password_hash.clone(),
                )
                .await?
            }
            None => password::verify_against_dummy(credentials.password).await,
        };

        let Some(user) = user.filter(|_| verified) else {
            tracing::info!(login = %credentials.login, "Login failed");
            return Err(AuthError::AuthenticationFailed);
        };

        let pair = self.rotation.start(&mut *uow.users(), user.id).await?;
        uow.commit().await?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, pair))
    }

    /// Create an account. Does not log the new user in.
    pub async fn register(
        &self,
        mut uow: UnitOfWork,
        csrf: CsrfPair<'_>,
        input: Registration,
    ) -> Result<User, AuthError> {
        self.csrf.verify(csrf.cookie, csrf.header)?;
        input
            .validate()
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let password_hash = password::hash_password_blocking(input.password).await?;
        let candidate = CreateUser {
            login: input.login,
            password_hash,
            email: input.email,
            role: ROLE_PLAYER.to_string(),
            updated_by: actors::USER.to_string(),
        };

        let Some(id) = uow.users().insert_ignore_conflict(&candidate).await? else {
            tracing::info!(login = %candidate.login, "Registration rejected, login taken");
            return Err(AuthError::Conflict);
        };
        let user = uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::Internal(format!("user {id} vanished after insert")))?;

        uow.commit().await.map_err(|e| match e {
            DbError::UniqueViolation(_) => AuthError::Conflict,
            other => AuthError::Storage(other),
        })?;

        tracing::info!(user_id = id, "User registered");
        Ok(user)
    }

    /// Rotate the presented token pair.
    pub async fn refresh(
        &self,
        mut uow: UnitOfWork,
        csrf: CsrfPair<'_>,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(User, TokenPair), AuthError> {
        self.csrf.verify(csrf.cookie, csrf.header)?;

        let (user, pair) = self
            .rotation
            .rotate(&mut *uow.users(), access_token, refresh_token)
            .await?;
        let user_id = user.id;
        uow.commit().await.map_err(|e| match e {
            DbError::StaleWrite => {
                tracing::warn!(user_id, "Refresh lost a race with a concurrent rotation");
                AuthError::AuthenticationFailed
            }
            other => AuthError::Storage(other),
        })?;

        tracing::debug!(user_id = user.id, "Tokens refreshed");
        Ok((user, pair))
    }

    /// Revoke whatever session the refresh token names.
    pub async fn logout(
        &self,
        mut uow: UnitOfWork,
        csrf: CsrfPair<'_>,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        self.csrf.verify(csrf.cookie, csrf.header)?;

        self.rotation.revoke(&mut *uow.users(), refresh_token).await?;
        uow.commit().await?;
        Ok(())
    }

    /// Verify an access token. Expired and forged tokens are reported apart so
    /// clients know whether a refresh is worth trying.
    pub fn authenticate(&self, access_token: Option<&str>) -> Result<Claims, AuthError> {
        let token = access_token.ok_or(AuthError::AuthenticationFailed)?;
        Ok(self.tokens().verify(token, ExpiryCheck::Enforce)?)
    }

    /// Load the user an authenticated request acts as.
    pub async fn current_user(
        &self,
        mut uow: UnitOfWork,
        user_id: DbId,
    ) -> Result<User, AuthError> {
        let user = uow.users().find_by_id(user_id).await?;
        uow.rollback().await?;
        user.ok_or(AuthError::AuthenticationFailed)
    }
}
