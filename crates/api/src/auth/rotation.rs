//! Refresh-token rotation with replay detection.
//!
//! Each user has at most one live refresh token, identified by the
//! fingerprint stored on their row. Login and refresh both overwrite that
//! fingerprint, so a refresh token that has been rotated away (or cleared by
//! logout) never matches again.
//!
//! Rotation replaces the fingerprint with a compare-and-set against the value
//! it just checked. Of two requests presenting the same refresh token at once,
//! only one can win: the other sees zero rows updated, or on a backend that
//! defers the check, fails its commit with
//! [`DbError::StaleWrite`](battlecards_db::DbError::StaleWrite).
//!
//! All persistence goes through the caller's [`UserRepository`]; nothing here
//! commits. The caller decides when the unit of work ends.

use battlecards_core::types::DbId;
use battlecards_db::models::user::{actors, User};
use battlecards_db::repositories::UserRepository;

use super::error::AuthError;
use super::fingerprint::RefreshFingerprinter;
use super::jwt::{ExpiryCheck, TokenService};

/// A freshly minted access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct RefreshRotation {
    tokens: TokenService,
    fingerprints: RefreshFingerprinter,
}

impl RefreshRotation {
    pub fn new(tokens: TokenService, fingerprints: RefreshFingerprinter) -> Self {
        Self {
            tokens,
            fingerprints,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Login path: mint a pair for an already authenticated user and record
    /// the refresh token's fingerprint.
    pub async fn start(
        &self,
        users: &mut dyn UserRepository,
        user_id: DbId,
    ) -> Result<TokenPair, AuthError> {
        self.issue_and_record(users, user_id).await
    }

    /// Refresh path: exchange a presented access/refresh pair for a new one.
    ///
    /// Every token-related failure collapses into
    /// [`AuthError::AuthenticationFailed`]; the reason is only logged.
    /// Storage errors propagate unchanged.
    pub async fn rotate(
        &self,
        users: &mut dyn UserRepository,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(User, TokenPair), AuthError> {
        let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
            return Err(reject("access or refresh token not presented"));
        };

        let access = self
            .tokens
            .verify(access_token, ExpiryCheck::Ignore)
            .map_err(|_| reject("access token failed verification"))?;
        let refresh = self
            .tokens
            .verify(refresh_token, ExpiryCheck::Ignore)
            .map_err(|_| reject("refresh token failed verification"))?;

        if access.user_id != refresh.user_id {
            return Err(reject("access and refresh tokens belong to different users"));
        }

        let Some(user) = users.find_by_id(refresh.user_id).await? else {
            return Err(reject("token user no longer exists"));
        };

        let current = user.refresh_token_hash.as_deref().unwrap_or_default();
        if current.is_empty() || !self.fingerprints.matches(refresh_token, current) {
            tracing::warn!(user_id = user.id, "Refresh token replayed or revoked");
            return Err(AuthError::AuthenticationFailed);
        }

        let pair = self.mint(user.id)?;
        let fingerprint = self.fingerprints.fingerprint(&pair.refresh_token);
        if !users
            .replace_refresh_token_hash(user.id, current, &fingerprint, actors::USER)
            .await?
        {
            tracing::warn!(user_id = user.id, "Refresh token rotated by a concurrent request");
            return Err(AuthError::AuthenticationFailed);
        }
        Ok((user, pair))
    }

    /// Logout path: clear the fingerprint of whoever the refresh token names.
    ///
    /// An absent or undecodable token is not an error.
    pub async fn revoke(
        &self,
        users: &mut dyn UserRepository,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };

        let claims = match self.tokens.verify(refresh_token, ExpiryCheck::Ignore) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring undecodable refresh token on logout");
                return Ok(());
            }
        };

        users
            .set_refresh_token_hash(claims.user_id, None, actors::USER)
            .await?;
        Ok(())
    }

    async fn issue_and_record(
        &self,
        users: &mut dyn UserRepository,
        user_id: DbId,
    ) -> Result<TokenPair, AuthError> {
        let pair = self.mint(user_id)?;
        let fingerprint = self.fingerprints.fingerprint(&pair.refresh_token);
        if !users
            .set_refresh_token_hash(user_id, Some(&fingerprint), actors::USER)
            .await?
        {
            return Err(reject("user disappeared while issuing tokens"));
        }
        Ok(pair)
    }

    fn mint(&self, user_id: DbId) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.tokens.issue_access_token(user_id)?,
            refresh_token: self.tokens.issue_refresh_token(user_id)?,
        })
    }
}

fn reject(reason: &'static str) -> AuthError {
    tracing::debug!(reason, "Refresh rejected");
    AuthError::AuthenticationFailed
}
