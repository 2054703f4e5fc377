//! In-memory user directory

use super::traits::UserDirectory;
use crate::types::{CardError, UserId, UserRecord};
use dashmap::DashMap;

/// `UserDirectory` backed by a `DashMap`
///
/// Registration is peripheral bookkeeping; the core only reads from it.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<UserId, UserRecord>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user
    pub fn register(&self, id: UserId, username: &str) -> UserRecord {
        let user = UserRecord {
            id,
            username: username.to_string(),
        };
        self.users.insert(id, user.clone());
        user
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get_user(&self, id: UserId) -> Result<UserRecord, CardError> {
        self.users
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CardError::user_not_found(id))
    }
}
