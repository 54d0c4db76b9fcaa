//! The linear-memory calling convention.
//!
//! Stored modules depend on this exact layout, so every constant here is part
//! of the wire contract:
//!
//! ```text
//!  0                 INPUT_OFFSET (0x10000)
//!  ├── module data ──┼── input bytes ──...
//!
//!  run(INPUT_OFFSET, input_len) -> ptr
//!
//!  ptr
//!  ├── N: u32 LE ──┼── N output bytes ──┤
//! ```
//!
//! Input is written at [`INPUT_OFFSET`]. When memory is too small it grows by
//! whole [`PAGE_SIZE`] pages. The entry point returns a pointer to an output
//! record: a 4-byte little-endian length followed by that many bytes.
//!
//! The functions in this module work against the [`LinearMemory`] trait so the
//! layout logic does not depend on a particular sandbox.

use crate::error::{ExecutionError, Result};

/// Name of the exported entry point.
pub const ENTRY_POINT: &str = "run";

/// Preferred name of the exported memory. If absent, the first exported memory
/// is used.
pub const MEMORY_EXPORT: &str = "memory";

/// Offset at which input bytes are placed.
pub const INPUT_OFFSET: u32 = 0x10000;

/// Memory growth granularity.
pub const PAGE_SIZE: u64 = 0x10000;

/// Size of the little-endian length prefix of an output record.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest addressable 32-bit linear memory, in bytes.
pub const MAX_MEMORY_BYTES: u64 = 1 << 32;

/// A byte-addressable linear memory that can grow in pages.
pub trait LinearMemory {
    /// Current size in bytes.
    fn size(&self) -> usize;

    /// Grow by `pages` pages of [`PAGE_SIZE`] bytes.
    fn grow(&mut self, pages: u64) -> std::result::Result<(), String>;

    /// Write `data` starting at `offset`.
    fn write(&mut self, offset: usize, data: &[u8]) -> std::result::Result<(), String>;

    /// The full contents of memory.
    fn data(&self) -> &[u8];
}

/// Where the input was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRegion {
    pub offset: u32,
    pub len: u32,
}

impl InputRegion {
    /// The `(pointer, length)` arguments for the entry point.
    ///
    /// Both are reinterpreted as `i32`; the module reads them as unsigned.
    pub fn as_args(&self) -> (i32, i32) {
        (self.offset as i32, self.len as i32)
    }
}

/// Pages to add so that a memory of `current_size` bytes covers `required`
/// bytes. Zero if it already does.
pub fn pages_needed(current_size: usize, required: u64) -> u64 {
    let current = current_size as u64;
    if required <= current {
        return 0;
    }
    (required - current).div_ceil(PAGE_SIZE)
}

/// Grow `memory` as needed and copy `input` to [`INPUT_OFFSET`].
///
/// Empty input is valid: nothing is written and the region has length zero.
pub fn place_input<M: LinearMemory + ?Sized>(memory: &mut M, input: &[u8]) -> Result<InputRegion> {
    let required = INPUT_OFFSET as u64 + input.len() as u64;
    if required > MAX_MEMORY_BYTES {
        return Err(ExecutionError::ResourceExhausted {
            required,
            message: "input does not fit in a 32-bit address space".to_string(),
        });
    }

    let pages = pages_needed(memory.size(), required);
    if pages > 0 {
        memory
            .grow(pages)
            .map_err(|message| ExecutionError::ResourceExhausted { required, message })?;
        tracing::trace!(pages, size = memory.size(), "grew linear memory");
    }

    memory
        .write(INPUT_OFFSET as usize, input)
        .map_err(|e| {
            ExecutionError::bounds(format!(
                "writing {} input bytes at {:#x}: {}",
                input.len(),
                INPUT_OFFSET,
                e
            ))
        })?;

    Ok(InputRegion {
        offset: INPUT_OFFSET,
        len: input.len() as u32,
    })
}

/// Read the output record at `ptr`.
pub fn read_output_record<M: LinearMemory + ?Sized>(memory: &M, ptr: u32) -> Result<Vec<u8>> {
    let data = memory.data();
    let start = ptr as usize;

    let prefix = start
        .checked_add(LENGTH_PREFIX_LEN)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            ExecutionError::bounds(format!(
                "output length prefix at {:#x} is outside memory of {} bytes",
                ptr,
                data.len()
            ))
        })?;
    let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
    len_bytes.copy_from_slice(prefix);
    let len = u32::from_le_bytes(len_bytes) as usize;

    let payload_start = start + LENGTH_PREFIX_LEN;
    let payload = payload_start
        .checked_add(len)
        .and_then(|end| data.get(payload_start..end))
        .ok_or_else(|| {
            ExecutionError::bounds(format!(
                "output of {} bytes at {:#x} is outside memory of {} bytes",
                len,
                payload_start,
                data.len()
            ))
        })?;

    Ok(payload.to_vec())
}
