//! Process-local session backend.
//!
//! Sessions buffer their writes and apply them to the shared store in one step
//! at commit. Reads see the committed state overlaid with the session's own
//! pending writes, so a session reads its own writes but never another
//! session's uncommitted ones.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use battlecards_core::scope::Closeable;
use battlecards_core::types::{DbId, Timestamp};
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::models::user::{CreateUser, User, DEFAULT_LANGUAGE};
use crate::repositories::UserRepository;
use crate::session::DbSession;

/// Name reported for login collisions, matching the Postgres constraint.
const LOGIN_CONSTRAINT: &str = "uq_users_login";

struct Tables {
    users: BTreeMap<DbId, User>,
    next_user_id: DbId,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            next_user_id: 1,
        }
    }
}

/// Shared committed state. Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session over this store.
    pub fn session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            pending: Vec::new(),
            open: true,
        }
    }

    /// Committed user count.
    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    /// Committed user with the given login, if any.
    pub async fn user_by_login(&self, login: &str) -> Option<User> {
        self.tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.login == login)
            .cloned()
    }

    async fn allocate_user_id(&self) -> DbId {
        let mut tables = self.tables.lock().await;
        let id = tables.next_user_id;
        tables.next_user_id += 1;
        id
    }
}

enum Write {
    InsertUser(User),
    SetRefreshHash {
        id: DbId,
        /// Fingerprint the row must still hold at commit; `None` is unconditional.
        expected: Option<String>,
        hash: Option<String>,
        updated_by: String,
        at: Timestamp,
    },
    DeleteUser(DbId),
}

fn apply(users: &mut BTreeMap<DbId, User>, write: &Write) {
    match write {
        Write::InsertUser(user) => {
            users.insert(user.id, user.clone());
        }
        Write::SetRefreshHash {
            id,
            hash,
            updated_by,
            at,
            ..
        } => {
            if let Some(user) = users.get_mut(id) {
                user.refresh_token_hash = hash.clone();
                user.updated_by = updated_by.clone();
                user.updated_at = *at;
            }
        }
        Write::DeleteUser(id) => {
            users.remove(id);
        }
    }
}

/// Reject a write whose precondition no longer holds against `users`.
fn check(users: &BTreeMap<DbId, User>, write: &Write) -> Result<(), DbError> {
    match write {
        Write::InsertUser(user) if users.values().any(|u| u.login == user.login) => {
            Err(DbError::UniqueViolation(LOGIN_CONSTRAINT))
        }
        Write::SetRefreshHash {
            id,
            expected: Some(expected),
            ..
        } => {
            let current = users.get(id).and_then(|u| u.refresh_token_hash.as_deref());
            if current == Some(expected.as_str()) {
                Ok(())
            } else {
                Err(DbError::StaleWrite)
            }
        }
        _ => Ok(()),
    }
}

/// Session over a [`MemoryStore`].
pub struct MemorySession {
    store: MemoryStore,
    pending: Vec<Write>,
    open: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), DbError> {
        if self.open {
            Ok(())
        } else {
            Err(DbError::SessionClosed)
        }
    }

    /// Committed users with this session's pending writes applied.
    async fn view(&self) -> Result<BTreeMap<DbId, User>, DbError> {
        self.ensure_open()?;
        let mut users = self.store.tables.lock().await.users.clone();
        for write in &self.pending {
            apply(&mut users, write);
        }
        Ok(users)
    }

    fn finish(&mut self) {
        self.pending.clear();
        self.open = false;
    }
}

#[async_trait]
impl Closeable for MemorySession {
    async fn close(&mut self) {
        if self.open {
            tracing::debug!(pending = self.pending.len(), "Discarding uncommitted memory session");
            self.finish();
        }
    }
}

#[async_trait]
impl DbSession for MemorySession {
    fn users(&mut self) -> Box<dyn UserRepository + '_> {
        Box::new(MemoryUserRepo { session: self })
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.ensure_open()?;
        let pending = std::mem::take(&mut self.pending);
        self.open = false;

        let mut tables = self.store.tables.lock().await;
        let mut users = tables.users.clone();
        for write in &pending {
            check(&users, write)?;
            apply(&mut users, write);
        }
        tables.users = users;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.ensure_open()?;
        self.finish();
        Ok(())
    }

    fn discard(&mut self) {
        self.finish();
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

struct MemoryUserRepo<'s> {
    session: &'s mut MemorySession,
}

#[async_trait]
impl UserRepository for MemoryUserRepo<'_> {
    async fn find_by_id(&mut self, id: DbId) -> Result<Option<User>, DbError> {
        Ok(self.session.view().await?.remove(&id))
    }

    async fn find_by_login(&mut self, login: &str) -> Result<Option<User>, DbError> {
        Ok(self
            .session
            .view()
            .await?
            .into_values()
            .find(|u| u.login == login))
    }

    async fn insert_ignore_conflict(
        &mut self,
        input: &CreateUser,
    ) -> Result<Option<DbId>, DbError> {
        let users = self.session.view().await?;
        if users.values().any(|u| u.login == input.login) {
            return Ok(None);
        }

        let id = self.session.store.allocate_user_id().await;
        let now = Utc::now();
        self.session.pending.push(Write::InsertUser(User {
            id,
            login: input.login.clone(),
            password_hash: input.password_hash.clone(),
            email: input.email.clone(),
            language: DEFAULT_LANGUAGE.to_string(),
            role: input.role.clone(),
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
            updated_by: input.updated_by.clone(),
        }));
        Ok(Some(id))
    }

    async fn set_refresh_token_hash(
        &mut self,
        id: DbId,
        hash: Option<&str>,
        updated_by: &str,
    ) -> Result<bool, DbError> {
        if !self.session.view().await?.contains_key(&id) {
            return Ok(false);
        }
        self.session.pending.push(Write::SetRefreshHash {
            id,
            expected: None,
            hash: hash.map(str::to_string),
            updated_by: updated_by.to_string(),
            at: Utc::now(),
        });
        Ok(true)
    }

    async fn replace_refresh_token_hash(
        &mut self,
        id: DbId,
        expected: &str,
        hash: &str,
        updated_by: &str,
    ) -> Result<bool, DbError> {
        let users = self.session.view().await?;
        let current = users.get(&id).and_then(|u| u.refresh_token_hash.as_deref());
        if current != Some(expected) {
            return Ok(false);
        }
        self.session.pending.push(Write::SetRefreshHash {
            id,
            expected: Some(expected.to_string()),
            hash: Some(hash.to_string()),
            updated_by: updated_by.to_string(),
            at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_by_id(&mut self, id: DbId) -> Result<bool, DbError> {
        if !self.session.view().await?.contains_key(&id) {
            return Ok(false);
        }
        self.session.pending.push(Write::DeleteUser(id));
        Ok(true)
    }
}
