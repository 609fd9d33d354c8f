//! Agent configuration

use anyhow::{bail, Context, Result};
use relevancy_lib::filestore::StoreBackend;
use relevancy_lib::relevancy::RelevancyConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "/etc/relevancy-agent/config";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Cluster name used in workload IDs
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// API server port for health/metrics/ingestion
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_enable_relevancy")]
    pub enable_relevancy: bool,

    /// Finalize interval per container in seconds
    #[serde(default = "default_update_data_period")]
    pub update_data_period_secs: u64,

    /// Maximum monitoring time per container in seconds
    #[serde(default = "default_max_sniffing_time")]
    pub max_sniffing_time_secs: u64,

    #[serde(default = "default_finalize_workers")]
    pub finalize_workers: usize,

    /// `sqlite` or `memory`
    #[serde(default = "default_file_store")]
    pub file_store: String,

    #[serde(default = "default_file_db_path")]
    pub file_db_path: PathBuf,

    /// Root of the inventory directory
    #[serde(default = "default_sbom_dir")]
    pub sbom_dir: PathBuf,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_cluster_name() -> String {
    "default".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_enable_relevancy() -> bool {
    true
}

fn default_update_data_period() -> u64 {
    60
}

fn default_max_sniffing_time() -> u64 {
    6 * 60 * 60
}

fn default_finalize_workers() -> usize {
    4
}

fn default_file_store() -> String {
    "sqlite".to_string()
}

fn default_file_db_path() -> PathBuf {
    PathBuf::from("/data/file.db")
}

fn default_sbom_dir() -> PathBuf {
    PathBuf::from("/data/sbom")
}

impl AgentConfig {
    /// Load configuration from `AGENT_CONFIG_FILE` (optional) and `AGENT_*` variables
    pub fn load() -> Result<Self> {
        let path = std::env::var("AGENT_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load configuration from a file (if it exists) overlaid with `AGENT_*` variables
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        agent.validate()?;
        Ok(agent)
    }

    fn validate(&self) -> Result<()> {
        if self.update_data_period_secs == 0 {
            bail!("update_data_period_secs must be positive");
        }
        if self.finalize_workers == 0 {
            bail!("finalize_workers must be positive");
        }
        self.store_backend()?;
        Ok(())
    }

    pub fn store_backend(&self) -> Result<StoreBackend> {
        match self.file_store.as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite(self.file_db_path.clone())),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("Unknown file_store {other:?}, expected \"sqlite\" or \"memory\""),
        }
    }

    pub fn relevancy_config(&self) -> RelevancyConfig {
        RelevancyConfig {
            update_data_period: Duration::from_secs(self.update_data_period_secs),
            max_sniffing_time: Duration::from_secs(self.max_sniffing_time_secs),
            enable_relevancy: self.enable_relevancy,
            finalize_workers: self.finalize_workers,
            cluster_name: self.cluster_name.clone(),
            node_name: self.node_name.clone(),
            ..RelevancyConfig::default()
        }
    }
}
