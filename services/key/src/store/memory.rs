//! In-process key store.

use super::{ensure_insertable, KeyStore};
use crate::error::StoreError;
use crate::key::Key;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
struct MemoryState {
    keys: HashMap<String, Key>,
    unissued: BTreeSet<String>,
}

/// Key store held in memory.
///
/// Each operation runs inside a single critical section, which makes every
/// check-and-mutate atomic. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    state: Mutex<MemoryState>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys in any state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().keys.len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn insert(&self, key: &Key) -> Result<(), StoreError> {
        ensure_insertable(key)?;

        let mut state = self.state.lock();
        if state.keys.contains_key(&key.id) {
            return Err(StoreError::DuplicateId(key.id.clone()));
        }
        state.unissued.insert(key.id.clone());
        state.keys.insert(key.id.clone(), key.clone());
        Ok(())
    }

    async fn allocate_one(&self) -> Result<Key, StoreError> {
        let mut state = self.state.lock();
        let id = state.unissued.pop_first().ok_or(StoreError::NotFound)?;
        let key = state
            .keys
            .get_mut(&id)
            .ok_or_else(|| StoreError::backend(format!("unissued index references missing key {id}")))?;
        key.issued = true;
        Ok(key.clone())
    }

    async fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let key = state.keys.get_mut(id).ok_or(StoreError::NotFound)?;
        if !key.issued {
            return Err(StoreError::NotIssued);
        }
        if key.canceled {
            return Err(StoreError::AlreadyCanceled);
        }
        key.canceled = true;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Key, StoreError> {
        self.state
            .lock()
            .keys
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_unissued(&self) -> Result<Vec<Key>, StoreError> {
        let state = self.state.lock();
        let keys: Vec<Key> = state
            .unissued
            .iter()
            .filter_map(|id| state.keys.get(id).cloned())
            .collect();
        if keys.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
