//! Durable key storage.
//!
//! A [`KeyStore`] owns the persisted key records and exposes the atomic state
//! transitions the lifecycle depends on. All mutual exclusion needed to keep
//! a key's state machine consistent lives behind this trait; callers never
//! hold a lock across calls.

pub mod memory;
pub mod redis;

pub use memory::MemoryKeyStore;
pub use redis::RedisKeyStore;

use crate::error::StoreError;
use crate::key::Key;
use async_trait::async_trait;

/// Reject keys that are not fresh before they reach a backend.
pub(crate) fn ensure_insertable(key: &Key) -> Result<(), StoreError> {
    if key.issued || key.canceled {
        return Err(StoreError::backend("only unissued keys can be inserted"));
    }
    Ok(())
}

/// Storage contract for redemption keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Persist a new key.
    ///
    /// Only fresh keys (neither issued nor canceled) are accepted; anything
    /// else fails with [`StoreError::Backend`]. Fails with
    /// [`StoreError::DuplicateId`] if the id exists, leaving the stored record
    /// untouched.
    async fn insert(&self, key: &Key) -> Result<(), StoreError>;

    /// Claim one unissued key, mark it issued and return it.
    ///
    /// The selection and the update are one atomic step: concurrent callers
    /// never receive the same key. Fails with [`StoreError::NotFound`] when
    /// the unissued pool is empty.
    async fn allocate_one(&self) -> Result<Key, StoreError>;

    /// Mark an issued key canceled.
    ///
    /// Fails with `NotFound`, `NotIssued` or `AlreadyCanceled`. Of two
    /// concurrent cancellations of one key, at most one succeeds.
    async fn cancel(&self, id: &str) -> Result<(), StoreError>;

    /// Current state of a key.
    async fn get(&self, id: &str) -> Result<Key, StoreError>;

    /// All keys not yet issued, ordered by id.
    ///
    /// An empty pool is reported as [`StoreError::NotFound`].
    async fn list_unissued(&self) -> Result<Vec<Key>, StoreError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}
