//! Async access to the store and the harness.
//!
//! Both are blocking (SQLite I/O, CPU-bound sandbox runs), so every operation
//! moves onto the blocking thread pool.

use std::sync::Arc;

use bytes::Bytes;
use hashbox_content_store::{BlobStore, ContentHash};
use hashbox_harness::{CancellationSignal, Harness};

use crate::error::ServiceError;

/// The store and harness shared by every request.
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn BlobStore>,
    harness: Arc<Harness>,
}

impl Backend {
    pub fn new(store: Arc<dyn BlobStore>, harness: Arc<Harness>) -> Self {
        Self { store, harness }
    }

    /// Store `data`, returning its hash.
    pub async fn put(&self, data: Bytes) -> Result<ContentHash, ServiceError> {
        let store = Arc::clone(&self.store);
        let hash = tokio::task::spawn_blocking(move || store.put(&data)).await??;
        Ok(hash)
    }

    /// Fetch the blob stored under `hash`.
    pub async fn get(&self, hash: ContentHash) -> Result<Bytes, ServiceError> {
        let store = Arc::clone(&self.store);
        let lookup = hash.clone();
        let data = tokio::task::spawn_blocking(move || store.get(&lookup)).await??;
        data.ok_or(ServiceError::NotFound(hash))
    }

    /// Fetch the module stored under `hash` and run it on `input`.
    pub async fn execute_stored(
        &self,
        hash: ContentHash,
        input: Bytes,
        signal: CancellationSignal,
    ) -> Result<Vec<u8>, ServiceError> {
        let module = self.get(hash).await?;
        let harness = Arc::clone(&self.harness);
        let output =
            tokio::task::spawn_blocking(move || harness.execute(&module, &input, &signal))
                .await??;
        Ok(output)
    }
}
