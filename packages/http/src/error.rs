use hashbox_content_store::{ContentHash, Error as StoreError};
use hashbox_harness::ExecutionError;
use http::StatusCode;

/// Failure of a backend operation, as seen by the transport.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(ContentHash),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// The status code this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) | ServiceError::Execution(_) | ServiceError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable kind, sent in the `x-hashbox-error` header.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Store(_) => "persistence",
            ServiceError::Execution(e) => e.kind().as_str(),
            ServiceError::Worker(_) => "worker",
        }
    }
}
