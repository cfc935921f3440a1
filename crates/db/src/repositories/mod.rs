//! Repository ports and their Postgres implementations.
//!
//! Repositories are built by a session for the lifetime of a borrow and are
//! never rebound to another session.

pub mod user_repo;

pub use user_repo::{PgUserRepo, UserRepository};
