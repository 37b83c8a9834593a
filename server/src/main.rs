//! Alexandria node binary — thin CLI shell over the crate-per-component
//! data plane: serves the replication endpoint, runs the indexing
//! engine's bus consumer, and exposes a health check.

mod ingest;
mod routes;
mod state;

use alexandria_bus::{AmqpBus, InMemoryBus, MessageBus};
use alexandria_core::config::NodeConfig;
use alexandria_indexer::IndexingEngine;
use clap::Parser;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Alexandria cluster node.
#[derive(Parser)]
#[command(name = "alexandria-node", version, about)]
struct Cli {
    /// Path to a node TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:7700")]
    bind: SocketAddr,

    /// Run with an in-process message bus instead of connecting to a broker
    /// (single-node demo / testing mode)
    #[arg(long)]
    standalone: bool,
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, shutting down");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;
    info!(node_id = config.node_id, datalake_dir = %config.datalake_dir.display(), "starting alexandria node");

    let bus: Arc<dyn MessageBus> = if cli.standalone {
        info!("standalone mode: using in-process message bus");
        Arc::new(InMemoryBus::new())
    } else {
        Arc::new(AmqpBus::connect(&config.broker_url, 10).await?)
    };

    let indexing_queue_name = config.indexing_queue_name.clone();
    let datalake_dir = config.datalake_dir.clone();
    let state = Arc::new(AppState::new(config, bus.clone()));

    let engine = Arc::new(IndexingEngine::new(state.index.clone(), datalake_dir));
    let consumer_stop = Arc::new(AtomicBool::new(false));
    let consumer_handle = tokio::spawn({
        let engine = engine.clone();
        let bus = bus.clone();
        let stop = consumer_stop.clone();
        async move { engine.run_consumer_loop(bus, indexing_queue_name, stop).await }
    });

    let router = routes::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(addr = %cli.bind, "listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    consumer_stop.store(true, Ordering::Relaxed);
    let _ = consumer_handle.await;
    info!("shutdown complete");
    Ok(())
}
