//! Repository for the `users` table.

use async_trait::async_trait;
use battlecards_core::types::DbId;
use sqlx::{PgConnection, Postgres, Transaction};

use crate::error::DbError;
use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, login, password_hash, email, language, role, refresh_token_hash, \
                        created_at, updated_at, updated_by";

/// User persistence bound to one session.
///
/// Writes are only durable once the owning session commits.
#[async_trait]
pub trait UserRepository: Send {
    /// Find a user by internal ID.
    async fn find_by_id(&mut self, id: DbId) -> Result<Option<User>, DbError>;

    /// Find a user by login (case-sensitive).
    async fn find_by_login(&mut self, login: &str) -> Result<Option<User>, DbError>;

    /// Insert a new user unless the login is already taken.
    ///
    /// Returns the assigned id, or `None` when the insert was skipped because
    /// of a login conflict.
    async fn insert_ignore_conflict(&mut self, input: &CreateUser)
        -> Result<Option<DbId>, DbError>;

    /// Overwrite (or clear, with `None`) the stored refresh-token fingerprint.
    ///
    /// Returns `true` if the row exists.
    async fn set_refresh_token_hash(
        &mut self,
        id: DbId,
        hash: Option<&str>,
        updated_by: &str,
    ) -> Result<bool, DbError>;

    /// Replace the stored fingerprint only while it still equals `expected`.
    ///
    /// Returns `false` when the row is gone or holds another fingerprint,
    /// including one written by a transaction that committed first. A backend
    /// that cannot decide this at statement time fails the commit with
    /// [`DbError::StaleWrite`] instead.
    async fn replace_refresh_token_hash(
        &mut self,
        id: DbId,
        expected: &str,
        hash: &str,
        updated_by: &str,
    ) -> Result<bool, DbError>;

    /// Delete a user. Returns `true` if a row was removed.
    async fn delete_by_id(&mut self, id: DbId) -> Result<bool, DbError>;
}

/// [`UserRepository`] over an open Postgres transaction.
pub struct PgUserRepo<'s> {
    tx: &'s mut Option<Transaction<'static, Postgres>>,
}

impl<'s> PgUserRepo<'s> {
    pub fn new(tx: &'s mut Option<Transaction<'static, Postgres>>) -> Self {
        Self { tx }
    }

    fn conn(&mut self) -> Result<&mut PgConnection, DbError> {
        self.tx.as_deref_mut().ok_or(DbError::SessionClosed)
    }
}

#[async_trait]
impl UserRepository for PgUserRepo<'_> {
    async fn find_by_id(&mut self, id: DbId) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(user)
    }

    async fn find_by_login(&mut self, login: &str) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE login = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(login)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(user)
    }

    async fn insert_ignore_conflict(
        &mut self,
        input: &CreateUser,
    ) -> Result<Option<DbId>, DbError> {
        let id = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO users (login, password_hash, email, role, updated_by)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT ON CONSTRAINT uq_users_login DO NOTHING
             RETURNING id",
        )
        .bind(&input.login)
        .bind(&input.password_hash)
        .bind(&input.email)
        .bind(&input.role)
        .bind(&input.updated_by)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(id)
    }

    async fn set_refresh_token_hash(
        &mut self,
        id: DbId,
        hash: Option<&str>,
        updated_by: &str,
    ) -> Result<bool, DbError> {
        let result =
            sqlx::query("UPDATE users SET refresh_token_hash = $2, updated_by = $3 WHERE id = $1")
                .bind(id)
                .bind(hash)
                .bind(updated_by)
                .execute(self.conn()?)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_refresh_token_hash(
        &mut self,
        id: DbId,
        expected: &str,
        hash: &str,
        updated_by: &str,
    ) -> Result<bool, DbError> {
        // Under read committed a concurrent rotation holds the row lock; once it
        // commits the WHERE clause is re-evaluated against the new fingerprint.
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, updated_by = $4
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(hash)
        .bind(updated_by)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&mut self, id: DbId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_transaction_reports_session_closed() {
        let mut tx = None;
        let mut repo = PgUserRepo::new(&mut tx);
        let err = repo.find_by_id(1).await.unwrap_err();
        assert!(matches!(err, DbError::SessionClosed));
    }
}
