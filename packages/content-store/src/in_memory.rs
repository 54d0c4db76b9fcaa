//! In-memory blob store.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;

use crate::{BlobStore, ContentHash, Error, Result};

/// A process-local blob store backed by a `HashMap`.
///
/// Contents are lost when the store is dropped.
///
/// # Example
///
/// ```rust
/// use hashbox_content_store::{BlobStore, InMemoryBlobStore};
///
/// let store = InMemoryBlobStore::new();
/// let first = store.put(b"payload").unwrap();
/// let second = store.put(b"payload").unwrap();
/// assert_eq!(first, second);
/// assert_eq!(store.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<ContentHash, Bytes>>,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::of(data);
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| Error::persistence("put", e.to_string()))?;
        blobs
            .entry(hash.clone())
            .or_insert_with(|| Bytes::copy_from_slice(data));
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| Error::persistence("get", e.to_string()))?;
        Ok(blobs.get(hash).cloned())
    }

    fn len(&self) -> Result<usize> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| Error::persistence("len", e.to_string()))?;
        Ok(blobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let store = InMemoryBlobStore::new();
        let hash = store.put(b"hello world").unwrap();
        assert_eq!(
            hash.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(&store.get(&hash).unwrap().unwrap()[..], b"hello world");
    }

    #[test]
    fn get_unknown_is_none() {
        let store = InMemoryBlobStore::new();
        assert!(store.get(&ContentHash::from("deadbeef")).unwrap().is_none());
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryBlobStore::new();
        let a = store.put(b"same").unwrap();
        let b = store.put(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn distinct_content_gets_distinct_entries() {
        let store = InMemoryBlobStore::new();
        let a = store.put(b"one").unwrap();
        let b = store.put(b"two").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn empty_blob_is_storable() {
        let store = InMemoryBlobStore::new();
        let hash = store.put(b"").unwrap();
        assert_eq!(store.get(&hash).unwrap().unwrap().len(), 0);
    }

    #[test]
    fn new_store_is_empty() {
        assert!(InMemoryBlobStore::new().is_empty().unwrap());
    }
}
