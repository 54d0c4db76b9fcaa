//! # hashbox-content-store
//!
//! Content-addressed blob storage. Every blob is keyed by the lowercase hex
//! SHA-256 digest of its bytes, so identical payloads collapse into a single
//! entry and a key always describes exactly one byte sequence.
//!
//! The store is append-only: there is no update and no delete. Writing the
//! same bytes twice returns the same hash and leaves the stored copy untouched.
//!
//! ## Backends
//!
//! - [`SqliteBlobStore`] - durable, one `blobs` table, safe for concurrent use.
//! - [`InMemoryBlobStore`] - process-local, mostly useful in tests.
//!
//! Both implement [`BlobStore`], which is object-safe so a single store can be
//! shared as `Arc<dyn BlobStore>` between the transport and the harness.
//!
//! ## Example
//!
//! ```rust
//! use hashbox_content_store::{BlobStore, ContentHash, InMemoryBlobStore};
//!
//! let store = InMemoryBlobStore::new();
//! let hash = store.put(b"hello world").unwrap();
//! assert_eq!(hash, ContentHash::of(b"hello world"));
//!
//! let data = store.get(&hash).unwrap().unwrap();
//! assert_eq!(&data[..], b"hello world");
//!
//! // Unknown hashes are not an error.
//! assert!(store.get(&ContentHash::from("deadbeef")).unwrap().is_none());
//! ```

pub use bytes::Bytes;

mod error;
mod hash;
mod in_memory;
mod sqlite;
mod traits;

pub use error::{Error, Result};
pub use hash::ContentHash;
pub use in_memory::InMemoryBlobStore;
pub use sqlite::SqliteBlobStore;
pub use traits::BlobStore;
