//! Storage-layer error type shared by every session backend.

/// Errors raised by sessions, repositories, and the unit of work.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The session was already committed, rolled back, or released.
    #[error("Session is already closed")]
    SessionClosed,

    /// A commit lost a race on a unique key.
    #[error("Duplicate value violates unique constraint: {0}")]
    UniqueViolation(&'static str),

    /// A conditional write found its row changed by a commit that landed first.
    #[error("Row was modified by a concurrent transaction")]
    StaleWrite,
}
