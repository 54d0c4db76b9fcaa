//! One-shot commands run against a local store.
//!
//! - `put <FILE>` - store a file, print its hash
//! - `get <HASH> [--output FILE]` - write a blob to stdout or a file
//! - `exec <HASH> [--input FILE] [--timeout-ms N]` - run a stored module

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hashbox_content_store::{BlobStore, ContentHash};
use hashbox_harness::{CancellationSignal, ExecutionError, Harness};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no blob stored under {0}")]
    NotFound(ContentHash),

    #[error(transparent)]
    Store(#[from] hashbox_content_store::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Store the contents of `file` and return its hash.
pub fn put(store: &dyn BlobStore, file: &Path) -> Result<ContentHash, CliError> {
    let data = read_file(file)?;
    Ok(store.put(&data)?)
}

/// Write the blob under `hash` to `output`, or to `out` if none is given.
pub fn get(
    store: &dyn BlobStore,
    hash: &str,
    output: Option<&Path>,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let hash = ContentHash::from(hash);
    let data = store.get(&hash)?.ok_or(CliError::NotFound(hash))?;
    match output {
        Some(path) => std::fs::write(path, &data).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => out.write_all(&data).map_err(|source| CliError::Io {
            path: PathBuf::from("<stdout>"),
            source,
        }),
    }
}

/// Run the module under `hash` on the contents of `input` (empty if none).
pub fn exec(
    store: &dyn BlobStore,
    harness: &Harness,
    hash: &str,
    input: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, CliError> {
    let hash = ContentHash::from(hash);
    let module = store.get(&hash)?.ok_or(CliError::NotFound(hash))?;
    let input = match input {
        Some(path) => read_file(path)?,
        None => Vec::new(),
    };
    let signal = match timeout {
        Some(timeout) => CancellationSignal::with_timeout(timeout),
        None => CancellationSignal::new(),
    };
    Ok(harness.execute(&module, &input, &signal)?)
}
