//! Alexandria admin CLI — operator tool for local ingest and bulk-ingest
//! benchmarking. Calls `alexandria-datalake` and `alexandria-workqueue`
//! directly with no server overhead, the way codescope's own `cs` binary
//! calls `codescope-core` directly instead of going over HTTP.

mod source;

use alexandria_datalake::LocalDatalake;
use alexandria_workqueue::{Ingestor, WorkQueue, WorkerPool};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use source::FileSystemDocumentSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "alexandria-admin", version, about = "Alexandria cluster admin tool")]
struct Cli {
    /// Local datalake root this node writes to
    #[arg(long, global = true, default_value = "./datalake")]
    datalake_dir: PathBuf,

    /// Print machine-readable JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a single document from a file on disk
    Ingest {
        /// bookId to assign
        book_id: u64,
        /// path to the raw document bytes
        path: PathBuf,
    },
    /// Show the recorded path for a bookId, if known
    Locate { book_id: u64 },
    /// Print datalake-wide stats
    Stats,
    /// Bulk-ingest benchmark driving the work queue (C9)
    Bulk {
        #[command(subcommand)]
        command: BulkCommands,
    },
}

#[derive(Subcommand)]
enum BulkCommands {
    /// Enqueue `count` bookIds and drive them with a worker pool until drained
    Run {
        /// number of bookIds to enqueue
        #[arg(long, default_value_t = 10)]
        count: u64,
        /// directory containing `<bookId>.txt` source documents
        #[arg(long)]
        source_dir: PathBuf,
        /// number of concurrent workers
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// this node's id, recorded in the progress map
        #[arg(long, default_value = "admin-node")]
        node_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    let datalake = LocalDatalake::new(cli.datalake_dir);

    match cli.command {
        Commands::Ingest { book_id, path } => {
            let raw = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let outcome = datalake.ingest(book_id, &raw)?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "status": format!("{:?}", outcome.status), "path": outcome.relative_path })
                );
            } else {
                println!("{:?} -> {}", outcome.status, outcome.relative_path);
            }
        }
        Commands::Locate { book_id } => match datalake.locate(book_id)? {
            Some(path) => {
                if json {
                    println!("{}", serde_json::json!({ "bookId": book_id, "path": path }));
                } else {
                    println!("{path}");
                }
            }
            None => {
                eprintln!("bookId {book_id} not found");
                std::process::exit(1);
            }
        },
        Commands::Stats => {
            let stats = datalake.stats()?;
            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!("books:       {}", stats.book_count);
                println!("total bytes: {}", stats.total_bytes);
            }
        }
        Commands::Bulk { command } => match command {
            BulkCommands::Run { count, source_dir, workers, node_id } => {
                run_bulk(datalake, source_dir, count, workers, node_id).await?;
            }
        },
    }

    Ok(())
}

async fn run_bulk(datalake: LocalDatalake, source_dir: PathBuf, count: u64, workers: usize, node_id: String) -> Result<()> {
    let queue = Arc::new(WorkQueue::new());
    let benchmark_id = format!("bulk-{}", node_id);
    queue.start(benchmark_id, count, None);

    let ingestor: Arc<dyn Ingestor> = Arc::new(DatalakeIngestor { datalake, source: FileSystemDocumentSource::new(source_dir) });
    let pool = WorkerPool::start(queue.clone(), ingestor, node_id, workers);

    loop {
        let status = queue.status();
        if status.stats.status == alexandria_workqueue::Status::Completed {
            println!(
                "completed: {} processed, {} errors, {:.1} books/s",
                status.total_processed, status.total_errors, status.throughput
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    pool.stop().await;
    Ok(())
}

struct DatalakeIngestor {
    datalake: LocalDatalake,
    source: FileSystemDocumentSource,
}

#[async_trait::async_trait]
impl Ingestor for DatalakeIngestor {
    async fn ingest(&self, book_id: u64) -> alexandria_core::error::Result<()> {
        let raw = self.source.fetch(book_id).await?;
        self.datalake.ingest(book_id, &raw)?;
        Ok(())
    }
}
