//! Shared node state — handed to every axum handler and background task.

use alexandria_bus::MessageBus;
use alexandria_core::config::NodeConfig;
use alexandria_datalake::LocalDatalake;
use alexandria_index::{IndexTransport, LocalIndexTransport, PartitionTable};
use alexandria_replication::ReplicationClient;
use std::sync::Arc;

pub struct AppState {
    pub config: NodeConfig,
    pub datalake: LocalDatalake,
    pub replication: ReplicationClient,
    pub bus: Arc<dyn MessageBus>,
    pub index: Arc<dyn IndexTransport>,
}

impl AppState {
    pub fn new(config: NodeConfig, bus: Arc<dyn MessageBus>) -> Self {
        let datalake = LocalDatalake::new(config.datalake_dir.clone());
        let replication = ReplicationClient::new();
        let partitions = PartitionTable::new(config.index_members.clone(), config.index_backup_count);
        let index = Arc::new(LocalIndexTransport::new(
            Arc::new(alexandria_index::InvertedIndex::new()),
            partitions,
        ));
        Self { config, datalake, replication, bus, index }
    }
}
