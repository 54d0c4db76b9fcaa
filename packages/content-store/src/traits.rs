//! The blob store interface.

use std::sync::Arc;

use bytes::Bytes;

use crate::{ContentHash, Result};

/// A content-addressed, append-only blob store.
///
/// Implementations must be safe to share between threads: `put` and `get`
/// can be called concurrently, and each call is individually atomic. A `get`
/// never observes a partially written blob.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn BlobStore>`.
pub trait BlobStore: Send + Sync {
    /// Store `data` and return its hash.
    ///
    /// The hash is computed before anything is persisted. If a blob with the
    /// same hash already exists the call is a no-op that still returns the
    /// hash; existing bytes are never overwritten.
    fn put(&self, data: &[u8]) -> Result<ContentHash>;

    /// Read the blob stored under `hash`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No blob has this hash (not an error condition).
    /// * `Ok(Some(bytes))` - The stored bytes.
    /// * `Err(Error)` - The storage layer failed.
    fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>>;

    /// Whether a blob with this hash exists.
    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.get(hash)?.is_some())
    }

    /// Number of distinct blobs held.
    fn len(&self) -> Result<usize>;

    /// Whether the store holds no blobs.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// Blanket implementations for shared handles

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        (**self).put(data)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        (**self).get(hash)
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        (**self).contains(hash)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        (**self).put(data)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        (**self).get(hash)
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        (**self).contains(hash)
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, InMemoryBlobStore};

    /// A store whose backend is always down.
    struct FailingStore;

    impl BlobStore for FailingStore {
        fn put(&self, _data: &[u8]) -> Result<ContentHash> {
            Err(Error::persistence("put", "backend down"))
        }

        fn get(&self, _hash: &ContentHash) -> Result<Option<Bytes>> {
            Err(Error::persistence("get", "backend down"))
        }

        fn len(&self) -> Result<usize> {
            Err(Error::persistence("len", "backend down"))
        }
    }

    #[test]
    fn trait_is_object_safe() {
        let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let hash = store.put(b"abc").unwrap();
        assert!(store.contains(&hash).unwrap());
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn boxed_store_delegates() {
        let store: Box<dyn BlobStore> = Box::new(InMemoryBlobStore::new());
        let hash = store.put(b"abc").unwrap();
        assert_eq!(&store.get(&hash).unwrap().unwrap()[..], b"abc");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn default_contains_propagates_errors() {
        let store = FailingStore;
        let result = store.contains(&ContentHash::of(b"x"));
        assert!(matches!(result, Err(Error::Persistence { operation: "get", .. })));
    }

    #[test]
    fn default_is_empty_propagates_errors() {
        assert!(FailingStore.is_empty().is_err());
    }
}
