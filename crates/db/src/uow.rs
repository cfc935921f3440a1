//! Unit of Work: one exclusively owned session per logical operation.
//!
//! A [`UnitOfWork`] acquires a fresh session from the [`SessionProvider`] and
//! registers it on the caller's [`ResourceScope`] for release. Repositories
//! handed out by [`UnitOfWork::users`] are bound to that session. Nothing is
//! durable until [`UnitOfWork::commit`] succeeds; dropping the unit of work
//! without committing discards every pending write.
//!
//! `commit` and `rollback` consume the unit of work, so a closed unit of work
//! cannot be reused.

use battlecards_core::scope::ResourceScope;
use tokio::sync::OwnedMutexGuard;

use crate::error::DbError;
use crate::repositories::UserRepository;
use crate::session::{DbSession, SessionProvider};

pub struct UnitOfWork {
    session: OwnedMutexGuard<Box<dyn DbSession>>,
    finished: bool,
}

impl UnitOfWork {
    /// Acquire a new session for `scope` and take exclusive ownership of it.
    pub async fn open(provider: &SessionProvider, scope: &ResourceScope) -> Result<Self, DbError> {
        let session = provider.acquire(scope).await?;
        let session = session.lock_owned().await;
        tracing::debug!("Unit of work opened");
        Ok(Self {
            session,
            finished: false,
        })
    }

    /// User repository bound to this unit of work's session.
    pub fn users(&mut self) -> Box<dyn UserRepository + '_> {
        self.session.users()
    }

    /// Persist every mutation made through this unit of work.
    pub async fn commit(mut self) -> Result<(), DbError> {
        self.finished = true;
        self.session.commit().await?;
        tracing::debug!("Unit of work committed");
        Ok(())
    }

    /// Revert every mutation made through this unit of work.
    pub async fn rollback(mut self) -> Result<(), DbError> {
        self.finished = true;
        self.session.rollback().await?;
        tracing::debug!("Unit of work rolled back");
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.finished && self.session.is_open() {
            tracing::debug!("Unit of work dropped before commit; discarding pending writes");
            self.session.discard();
        }
    }
}
