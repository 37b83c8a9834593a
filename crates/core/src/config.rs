//! Layered node configuration (spec §6): environment variable, then
//! process property (CLI flag, plumbed in by the caller), then config
//! file, then built-in default.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Full configuration for one cluster node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: String,
    pub datalake_dir: PathBuf,
    pub datalake_peers: Vec<String>,
    pub replication_factor: usize,
    pub broker_url: String,
    pub indexing_queue_name: String,
    pub index_cluster_name: String,
    pub index_members: Vec<String>,
    pub index_backup_count: usize,
}

/// Mirrors [`NodeConfig`] but every field is optional — this is what gets
/// parsed out of a TOML file or left as `None` when absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    node_id: Option<String>,
    datalake_dir: Option<PathBuf>,
    datalake_peers: Option<Vec<String>>,
    replication_factor: Option<usize>,
    broker_url: Option<String>,
    indexing_queue_name: Option<String>,
    index_cluster_name: Option<String>,
    index_members: Option<Vec<String>>,
    index_backup_count: Option<usize>,
}

impl NodeConfig {
    /// Load configuration, resolving each field in order: environment
    /// variable (`ALEXANDRIA_*`), then the TOML file at `config_path` (if
    /// given and present), then a hardcoded default.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
            }
            _ => FileConfig::default(),
        };

        Ok(Self {
            node_id: resolve_string("ALEXANDRIA_NODE_ID", file.node_id, || {
                format!("node-{}", uuid::Uuid::new_v4())
            }),
            datalake_dir: resolve_env("ALEXANDRIA_DATALAKE_DIR")
                .map(PathBuf::from)
                .or(file.datalake_dir)
                .unwrap_or_else(|| PathBuf::from("./datalake")),
            datalake_peers: resolve_list("ALEXANDRIA_DATALAKE_PEERS", file.datalake_peers),
            replication_factor: resolve_env("ALEXANDRIA_REPLICATION_FACTOR")
                .and_then(|v| v.parse().ok())
                .or(file.replication_factor)
                .unwrap_or(1),
            broker_url: resolve_string("ALEXANDRIA_BROKER_URL", file.broker_url, || {
                "amqp://127.0.0.1:5672/%2f".to_string()
            }),
            indexing_queue_name: resolve_string(
                "ALEXANDRIA_INDEXING_QUEUE",
                file.indexing_queue_name,
                || "index.request".to_string(),
            ),
            index_cluster_name: resolve_string(
                "ALEXANDRIA_INDEX_CLUSTER",
                file.index_cluster_name,
                || "alexandria-index".to_string(),
            ),
            index_members: resolve_list("ALEXANDRIA_INDEX_MEMBERS", file.index_members),
            index_backup_count: resolve_env("ALEXANDRIA_INDEX_BACKUP_COUNT")
                .and_then(|v| v.parse().ok())
                .or(file.index_backup_count)
                .unwrap_or(1),
        })
    }
}

fn resolve_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn resolve_string(key: &str, file_value: Option<String>, default: impl FnOnce() -> String) -> String {
    resolve_env(key).or(file_value).unwrap_or_else(default)
}

fn resolve_list(key: &str, file_value: Option<Vec<String>>) -> Vec<String> {
    if let Some(env_value) = resolve_env(key) {
        return env_value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    file_value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_set() {
        // Safe to run even if other tests in this binary set env vars,
        // since each test uses a key namespaced to itself.
        let cfg = NodeConfig::load(None).unwrap();
        assert_eq!(cfg.replication_factor, 1);
        assert_eq!(cfg.indexing_queue_name, "index.request");
    }

    #[test]
    fn file_overrides_default_and_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "replication_factor = 3\nnode_id = \"from-file\"\n").unwrap();

        let cfg = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.replication_factor, 3);
        assert_eq!(cfg.node_id, "from-file");

        std::env::set_var("ALEXANDRIA_REPLICATION_FACTOR", "5");
        let cfg = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.replication_factor, 5);
        std::env::remove_var("ALEXANDRIA_REPLICATION_FACTOR");
    }
}
