//! Error types for sandboxed execution.

use thiserror::Error;

/// Why an execution failed.
///
/// Every variant is a distinct kind so callers can map them to different
/// outward behavior; use [`ExecutionError::kind`] to match on the kind alone.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The sandbox engine could not be created.
    ///
    /// Only returned while constructing a [`Harness`](crate::Harness).
    #[error("engine setup failed: {message}")]
    Engine { message: String },

    /// The module bytes could not be compiled or instantiated.
    ///
    /// Covers malformed binaries, modules that require imports, and start
    /// functions that trap.
    #[error("instantiation failed: {message}")]
    Instantiation { message: String },

    /// The module does not follow the calling convention: no `run` export,
    /// `run` with the wrong signature, or no exported memory.
    #[error("contract violation: {message}")]
    ContractViolation { message: String },

    /// Linear memory could not grow enough to hold the input.
    #[error("resource exhausted: cannot grow memory to {required} bytes: {message}")]
    ResourceExhausted { required: u64, message: String },

    /// The entry point trapped.
    #[error("execution trapped: {message}")]
    Trap { message: String },

    /// An input write or output read fell outside linear memory.
    #[error("bounds violation: {message}")]
    BoundsViolation { message: String },

    /// The caller's cancellation signal fired before the call completed.
    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::Engine { .. } => ErrorKind::Engine,
            ExecutionError::Instantiation { .. } => ErrorKind::Instantiation,
            ExecutionError::ContractViolation { .. } => ErrorKind::ContractViolation,
            ExecutionError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            ExecutionError::Trap { .. } => ErrorKind::Trap,
            ExecutionError::BoundsViolation { .. } => ErrorKind::BoundsViolation,
            ExecutionError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn contract(message: impl Into<String>) -> Self {
        ExecutionError::ContractViolation {
            message: message.into(),
        }
    }

    pub(crate) fn bounds(message: impl Into<String>) -> Self {
        ExecutionError::BoundsViolation {
            message: message.into(),
        }
    }
}

/// The kind of an [`ExecutionError`], without its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Engine,
    Instantiation,
    ContractViolation,
    ResourceExhausted,
    Trap,
    BoundsViolation,
    Cancelled,
}

impl ErrorKind {
    /// Stable snake_case name, suitable for logs and response bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Engine => "engine",
            ErrorKind::Instantiation => "instantiation",
            ErrorKind::ContractViolation => "contract_violation",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Trap => "trap",
            ErrorKind::BoundsViolation => "bounds_violation",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, ExecutionError>;
