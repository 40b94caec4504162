//! crates/doc_review_core/src/persistence.rs
//!
//! Session artifacts kept in durable key/value storage: the access token, the
//! user role, and the serialized state snapshot.

use crate::ports::{KeyValueStore, StorageError};
use crate::store::{AppStore, SnapshotError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub const ACCESS_TOKEN_KEY: &str = "okta_access_token";
pub const USER_ROLE_KEY: &str = "user_role";
pub const SNAPSHOT_KEY: &str = "document-app-storage";

/// Typed access to the session keys of a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStorage {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.backend.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.backend.get(ACCESS_TOKEN_KEY)
    }

    pub fn clear_access_token(&self) -> Result<(), StorageError> {
        self.backend.remove(ACCESS_TOKEN_KEY)
    }

    pub fn set_user_role(&self, role: &str) -> Result<(), StorageError> {
        self.backend.set(USER_ROLE_KEY, role)
    }

    pub fn user_role(&self) -> Result<Option<String>, StorageError> {
        self.backend.get(USER_ROLE_KEY)
    }

    pub fn clear_user_role(&self) -> Result<(), StorageError> {
        self.backend.remove(USER_ROLE_KEY)
    }

    /// Removes every key, including the snapshot.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.backend.clear()
    }

    pub fn save_snapshot(&self, store: &AppStore) -> Result<(), SnapshotError> {
        let json = store.to_snapshot()?;
        self.backend.set(SNAPSHOT_KEY, &json)?;
        debug!(bytes = json.len(), "Saved state snapshot");
        Ok(())
    }

    /// Loads the saved snapshot.
    ///
    /// A missing or unreadable snapshot yields a fresh store; the bad blob is
    /// logged and left in place until the next save overwrites it.
    pub fn load_snapshot(&self) -> AppStore {
        match self.backend.get(SNAPSHOT_KEY) {
            Ok(Some(json)) => AppStore::from_snapshot(&json).unwrap_or_else(|e| {
                warn!("Discarding unreadable state snapshot: {}", e);
                AppStore::default()
            }),
            Ok(None) => AppStore::default(),
            Err(e) => {
                warn!("Failed to read state snapshot: {}", e);
                AppStore::default()
            }
        }
    }
}

/// A process-local [`KeyValueStore`]. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SessionStorage {
        SessionStorage::new(Arc::new(MemoryKeyValueStore::new()))
    }

    #[test]
    fn access_token_round_trips_exactly() {
        let storage = storage();
        let token = "eyJhbGciOi.J9 with spaces\u{e9}";
        storage.set_access_token(token).unwrap();
        assert_eq!(storage.access_token().unwrap().as_deref(), Some(token));

        storage.clear_access_token().unwrap();
        assert_eq!(storage.access_token().unwrap(), None);
    }

    #[test]
    fn token_and_role_are_independent() {
        let storage = storage();
        storage.set_access_token("t").unwrap();
        storage.set_user_role("cca").unwrap();

        storage.clear_user_role().unwrap();
        assert_eq!(storage.access_token().unwrap().as_deref(), Some("t"));
        assert_eq!(storage.user_role().unwrap(), None);
    }

    #[test]
    fn missing_keys_are_absent_not_errors() {
        let storage = storage();
        assert!(storage.access_token().unwrap().is_none());
        assert!(storage.user_role().unwrap().is_none());
        assert_eq!(storage.load_snapshot(), AppStore::default());
    }

    #[test]
    fn snapshot_survives_save_and_load() {
        let storage = storage();
        let mut store = AppStore::default();
        store.set_states(vec!["Texas".to_string()]);
        store.set_current_state(Some("Texas".to_string()));

        storage.save_snapshot(&store).unwrap();
        assert_eq!(storage.load_snapshot(), store);

        storage.clear_all().unwrap();
        assert_eq!(storage.load_snapshot(), AppStore::default());
    }

    #[test]
    fn corrupt_snapshot_loads_as_fresh_store() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        backend.set(SNAPSHOT_KEY, "{not json").unwrap();
        let storage = SessionStorage::new(backend);
        assert_eq!(storage.load_snapshot(), AppStore::default());
    }
}
