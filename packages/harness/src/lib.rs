//! # hashbox-harness
//!
//! Runs self-contained WebAssembly modules against an input buffer and
//! returns an output buffer.
//!
//! ## Calling Convention
//!
//! A module must export:
//!
//! - a function `run(input_ptr: i32, input_len: i32) -> i32`
//! - a linear memory (preferably named `memory`)
//!
//! The harness writes the input at offset `0x10000`, growing memory in 64 KiB
//! pages when needed, then calls `run`. The returned pointer addresses an
//! output record: a little-endian `u32` length followed by that many bytes.
//! See [`convention`] for the exact layout.
//!
//! ## Isolation
//!
//! Modules get no imports, so they cannot reach the host. Every call builds a
//! fresh sandbox and drops it before returning; nothing carries over between
//! calls, and the same `(module, input)` always produces the same output or
//! the same [`ErrorKind`].
//!
//! ## Cancellation
//!
//! Pass a [`CancellationSignal`] to [`Harness::execute`]. Running code checks
//! it at every epoch tick (10 ms by default) and stops with
//! [`ExecutionError::Cancelled`] once it fires.
//!
//! ## Example
//!
//! ```ignore
//! use hashbox_harness::{CancellationSignal, Harness, HarnessConfig};
//!
//! let harness = Harness::new(HarnessConfig::default())?;
//! let output = harness.execute(&echo_module, b"ping", &CancellationSignal::new())?;
//! assert_eq!(output, b"ping");
//! ```

pub mod cancel;
pub mod convention;
pub mod error;
pub mod harness;

mod epoch;

pub use cancel::{CancelOnDrop, CancellationSignal};
pub use error::{ErrorKind, ExecutionError, Result};
pub use harness::{ExecutionId, Harness, HarnessConfig};
