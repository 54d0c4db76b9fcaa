use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hashbox_content_store::{BlobStore, SqliteBlobStore};
use hashbox_harness::{Harness, HarnessConfig};
use hashbox_http::{serve, Backend, Router, ServerConfig};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::CliError;

/// hashbox - content-addressed blob store with a WebAssembly runner
#[derive(Parser, Debug)]
#[command(name = "hashbox")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database holding the blobs
    #[arg(long, global = true, default_value = "blobs.db")]
    db: PathBuf,

    /// How often running modules check for cancellation, in milliseconds
    #[arg(long, global = true, default_value_t = 10)]
    epoch_tick_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        listen: SocketAddr,

        /// Reject request bodies larger than this many bytes
        #[arg(long)]
        max_body_bytes: Option<usize>,
    },
    /// Store a file and print its hash
    Put { file: PathBuf },
    /// Print a stored blob
    Get {
        hash: String,

        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run a stored module and print its output
    Exec {
        hash: String,

        /// File passed to the module as input
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Command(#[from] CliError),

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: hashbox_content_store::Error,
    },

    #[error(transparent)]
    Store(#[from] hashbox_content_store::Error),

    #[error(transparent)]
    Harness(#[from] hashbox_harness::ExecutionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let store = Arc::new(SqliteBlobStore::open(&args.db).map_err(|source| Error::Open {
        path: args.db.clone(),
        source,
    })?);
    let harness_config = HarnessConfig {
        epoch_tick: Duration::from_millis(args.epoch_tick_ms.max(1)),
    };

    match args.command {
        Command::Serve {
            listen,
            max_body_bytes,
        } => {
            let harness = Arc::new(Harness::new(harness_config)?);
            let shared: Arc<dyn BlobStore> = store.clone();
            let router = Arc::new(Router::new(Backend::new(shared, harness)));
            let config = ServerConfig { max_body_bytes };

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async {
                let listener = tokio::net::TcpListener::bind(listen).await?;
                tracing::info!(addr = %listener.local_addr()?, db = %args.db.display(), "listening");
                serve(listener, router, config, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!(error = %e, "failed to listen for ctrl-c");
                    }
                })
                .await
            })?;
            // Connection tasks die with the runtime.
            drop(runtime);
        }
        Command::Put { file } => {
            let hash = commands::put(store.as_ref(), &file)?;
            println!("{}", hash);
        }
        Command::Get { hash, output } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            commands::get(store.as_ref(), &hash, output.as_deref(), &mut out)?;
            out.flush()?;
        }
        Command::Exec {
            hash,
            input,
            timeout_ms,
        } => {
            let harness = Harness::new(harness_config)?;
            let output = commands::exec(
                store.as_ref(),
                &harness,
                &hash,
                input.as_deref(),
                timeout_ms.map(Duration::from_millis),
            )?;
            let mut out = std::io::stdout().lock();
            out.write_all(&output)?;
            out.flush()?;
        }
    }

    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => tracing::debug!("store still shared at exit; dropping"),
    }
    Ok(())
}
