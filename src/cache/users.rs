//! In-process user detail cache

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::models::User;

/// Cache of fully fetched user objects, keyed by lowercased username.
///
/// Avoids re-querying the directory service for the same user during a batch
/// run. Entries go stale the moment the user is mutated; callers must
/// overwrite through [`UserCache::insert`] (the client's `refresh_user` does
/// this) before making further decisions against that user.
#[derive(Debug, Default)]
pub struct UserCache {
    inner: RwLock<HashMap<String, User>>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a user by already-lowercased username.
    pub fn get(&self, username: &str) -> Option<User> {
        self.inner.read().get(username).cloned()
    }

    /// Insert or overwrite a user, keyed by its lowercased username.
    pub fn insert(&self, user: User) {
        self.inner
            .write()
            .insert(user.username.to_lowercase(), user);
    }

    /// Drop a cached user.
    pub fn invalidate(&self, username: &str) {
        self.inner.write().remove(&username.to_lowercase());
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
