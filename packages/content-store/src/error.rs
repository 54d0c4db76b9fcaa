//! Error types for blob storage.
//!
//! A missing blob is not an error: lookups return `Ok(None)`. The only failure
//! a store reports is a genuine persistence failure.

use thiserror::Error;

/// Errors from a [`BlobStore`](crate::BlobStore).
#[derive(Debug, Error)]
pub enum Error {
    /// The durable storage layer failed.
    ///
    /// `operation` names the store operation that failed (`"open"`, `"put"`,
    /// `"get"`, ...), the source carries the backend error.
    #[error("persistence error during {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wrap a backend error raised while performing `operation`.
    pub fn persistence(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Persistence {
            operation,
            source: source.into(),
        }
    }

    /// The store operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Error::Persistence { operation, .. } => operation,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn persistence_display_names_operation() {
        let e = Error::persistence("put", "disk full");
        let display = format!("{}", e);
        assert!(display.contains("put"));
        assert!(display.contains("disk full"));
        assert_eq!(e.operation(), "put");
    }

    #[test]
    fn persistence_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only");
        let e = Error::persistence("open", io_err);
        assert!(StdError::source(&e).is_some());
    }
}
