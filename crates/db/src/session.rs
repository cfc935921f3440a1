//! Database sessions and the factory the scoped provider builds them with.
//!
//! A session is one isolated transactional context. It is handed out fresh
//! for every acquisition, owned exclusively by one unit of work, and released
//! (rolled back if still open) when the acquiring scope ends.

use async_trait::async_trait;
use battlecards_core::scope::{Closeable, ResourceFactory, ScopedProvider};
use sqlx::{Postgres, Transaction};

use crate::error::DbError;
use crate::memory::MemoryStore;
use crate::repositories::{PgUserRepo, UserRepository};
use crate::DbPool;

/// A transactional persistence session.
#[async_trait]
pub trait DbSession: Closeable {
    /// User repository bound to this session.
    fn users(&mut self) -> Box<dyn UserRepository + '_>;

    /// Make every write performed through this session durable.
    async fn commit(&mut self) -> Result<(), DbError>;

    /// Revert every write performed through this session.
    async fn rollback(&mut self) -> Result<(), DbError>;

    /// Drop pending writes without awaiting. Used when a unit of work goes out
    /// of scope before it was committed or rolled back.
    fn discard(&mut self);

    /// `true` until the session is committed, rolled back, or discarded.
    fn is_open(&self) -> bool;
}

/// Postgres session owning one transaction begun at acquisition.
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    pub async fn begin(pool: &DbPool) -> Result<Self, DbError> {
        let tx = pool.begin().await?;
        Ok(Self { tx: Some(tx) })
    }

    fn take(&mut self) -> Result<Transaction<'static, Postgres>, DbError> {
        self.tx.take().ok_or(DbError::SessionClosed)
    }
}

#[async_trait]
impl Closeable for PgSession {
    async fn close(&mut self) {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "Failed to roll back session on release");
            }
        }
    }
}

#[async_trait]
impl DbSession for PgSession {
    fn users(&mut self) -> Box<dyn UserRepository + '_> {
        Box::new(PgUserRepo::new(&mut self.tx))
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.take()?.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.take()?.rollback().await?;
        Ok(())
    }

    fn discard(&mut self) {
        // sqlx queues a ROLLBACK when an open transaction is dropped.
        drop(self.tx.take());
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}

/// Explicit factory object for database sessions.
#[derive(Clone)]
pub enum SessionFactory {
    /// One transaction per session from a Postgres pool.
    Postgres(DbPool),
    /// Sessions over a process-local store (development and tests).
    Memory(MemoryStore),
}

impl SessionFactory {
    /// Check that the backing store is reachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pool) => crate::health_check(pool).await.map_err(DbError::from),
            Self::Memory(_) => Ok(()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

#[async_trait]
impl ResourceFactory for SessionFactory {
    type Resource = Box<dyn DbSession>;
    type Error = DbError;

    async fn create(&self) -> Result<Box<dyn DbSession>, DbError> {
        match self {
            Self::Postgres(pool) => Ok(Box::new(PgSession::begin(pool).await?)),
            Self::Memory(store) => Ok(Box::new(store.session())),
        }
    }
}

/// Scoped provider handing out one fresh session per acquisition.
pub type SessionProvider = ScopedProvider<SessionFactory>;
