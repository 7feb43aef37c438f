//! Key lifecycle rules.
//!
//! [`KeyLifecycleService`] turns caller intent into [`KeyStore`] operations
//! and classifies every store failure into a [`KeyError`]. It keeps no state
//! of its own between calls and performs no retries.

use crate::error::{ErrorKind, KeyError, StoreError};
use crate::key::{Key, KeyGenerator};
use crate::metrics;
use crate::store::KeyStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn, Span};

/// Business-rule layer over a [`KeyStore`].
#[derive(Clone)]
pub struct KeyLifecycleService {
    store: Arc<dyn KeyStore>,
    generator: KeyGenerator,
}

impl KeyLifecycleService {
    /// Create a service over the given store.
    pub fn new(store: Arc<dyn KeyStore>, generator: KeyGenerator) -> Self {
        Self { store, generator }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Generate and persist a fresh unissued key.
    ///
    /// A generated id that collides with an existing key is reported as an
    /// internal error; no new id is drawn.
    #[instrument(skip(self), fields(key_id))]
    pub async fn generate(&self) -> Result<Key, KeyError> {
        let started = Instant::now();
        let key = Key::new(self.generator.generate());
        Span::current().record("key_id", key.id.as_str());

        let result = match self.store.insert(&key).await {
            Ok(()) => Ok(key),
            Err(StoreError::DuplicateId(id)) => Err(KeyError::internal(format!(
                "generated key {id} collides with an existing key"
            ))),
            Err(e) => Err(KeyError::bad_params(format!("failed to insert key: {e}"))),
        };

        observe("generate", started, &result);
        result
    }

    /// Allocate one unissued key to the caller.
    #[instrument(skip(self), fields(key_id))]
    pub async fn allocate(&self) -> Result<Key, KeyError> {
        let started = Instant::now();

        let result = match self.store.allocate_one().await {
            Ok(key) => {
                Span::current().record("key_id", key.id.as_str());
                Ok(key)
            }
            Err(StoreError::NotFound) => Err(KeyError::not_found("no unissued key available")),
            Err(e) => Err(KeyError::bad_params(format!(
                "failed to find unreleased key: {e}"
            ))),
        };

        observe("allocate", started, &result);
        result
    }

    /// Cancel an issued key.
    #[instrument(skip(self), fields(key_id = %id))]
    pub async fn cancel(&self, id: &str) -> Result<(), KeyError> {
        let started = Instant::now();

        let result = if id.trim().is_empty() {
            Err(KeyError::bad_params("empty key id"))
        } else {
            match self.store.cancel(id).await {
                Ok(()) => Ok(()),
                Err(StoreError::NotFound) => Err(KeyError::not_found("key is not found")),
                Err(e @ (StoreError::NotIssued | StoreError::AlreadyCanceled)) => {
                    Err(KeyError::conflict(e.to_string()))
                }
                Err(e) => Err(KeyError::bad_params(format!("failed to cancel key: {e}"))),
            }
        };

        observe("cancel", started, &result);
        result
    }

    /// Current state of a key.
    #[instrument(skip(self), fields(key_id = %id))]
    pub async fn verify(&self, id: &str) -> Result<Key, KeyError> {
        let started = Instant::now();

        let result = if id.trim().is_empty() {
            Err(KeyError::bad_params("empty key id"))
        } else {
            match self.store.get(id).await {
                Ok(key) => Ok(key),
                Err(StoreError::NotFound) => Err(KeyError::not_found("key is not found")),
                Err(e) => Err(KeyError::bad_params(format!("failed to verify key: {e}"))),
            }
        };

        observe("verify", started, &result);
        result
    }

    /// All keys still waiting to be issued.
    #[instrument(skip(self))]
    pub async fn list_unreleased(&self) -> Result<Vec<Key>, KeyError> {
        let started = Instant::now();

        let result = match self.store.list_unissued().await {
            Ok(keys) => Ok(keys),
            Err(StoreError::NotFound) => Err(KeyError::not_found("no unreleased keys")),
            Err(e) => Err(KeyError::bad_params(format!(
                "failed to list unreleased keys: {e}"
            ))),
        };

        observe("list_unreleased", started, &result);
        result
    }
}

/// Log and record metrics for a finished operation.
fn observe<T>(operation: &'static str, started: Instant, result: &Result<T, KeyError>) {
    let elapsed = started.elapsed();
    metrics::record_latency(operation, elapsed.as_secs_f64());

    match result {
        Ok(_) => {
            metrics::record_operation(operation, "ok");
            info!(operation, elapsed_ms = elapsed.as_millis(), "Key operation completed");
        }
        Err(e) => {
            metrics::record_operation(operation, e.kind.as_str());
            match e.kind {
                ErrorKind::Internal => {
                    error!(operation, kind = e.kind.as_str(), error = %e, "Key operation failed");
                }
                _ => {
                    warn!(operation, kind = e.kind.as_str(), error = %e, "Key operation rejected");
                }
            }
        }
    }
}
