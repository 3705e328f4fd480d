//! Credential stores
//!
//! The gate only needs two operations from its user store: lookup by
//! username and upsert. The SQLite [`Database`] is the production store;
//! [`InMemoryCredentialStore`] backs tests and embedded setups.

use anime_db::{Database, NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::AuthError;

/// User lookup and provisioning
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    /// Insert or update a user keyed by username
    async fn save(&self, user: NewUser) -> Result<User, AuthError>;
}

#[async_trait]
impl CredentialStore for Database {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.get_user_by_username(username).await?)
    }

    async fn save(&self, user: NewUser) -> Result<User, AuthError> {
        Ok(self.save_user(user).await?)
    }
}

/// Process-local credential store
///
/// Reads share the lock; a save takes the whole store exclusively.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
    next_id: AtomicI64,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn save(&self, user: NewUser) -> Result<User, AuthError> {
        let now = Utc::now();
        let mut users = self.users.write();

        let (id, created_at) = match users.get(&user.username) {
            Some(existing) => (existing.id, existing.created_at),
            None => (self.next_id.fetch_add(1, Ordering::Relaxed) + 1, now),
        };

        let saved = User {
            id,
            username: user.username,
            name: user.name,
            password_hash: user.password_hash,
            roles: user.roles,
            created_at,
            updated_at: now,
        };

        users.insert(saved.username.clone(), saved.clone());
        Ok(saved)
    }
}
