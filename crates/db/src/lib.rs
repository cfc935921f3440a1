//! Persistence layer: user model, repository ports, session backends, and
//! the unit of work.

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod session;
pub mod uow;

pub use error::DbError;
pub use memory::MemoryStore;
pub use session::{DbSession, SessionFactory, SessionProvider};
pub use uow::UnitOfWork;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
