//! simon.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SCHEDULER_NAME, FAKE_NODE_NAME_PREFIX, PLAN_FILE_NAME};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimonConfig {
    /// Pods targeting this scheduler are the ones the simulator drives.
    pub scheduler_name: String,
    pub fake_node_prefix: String,
    /// Pause between starting the engine and injecting pods.
    pub settle_delay_ms: u64,
    /// Give up on a stalled run after this long. Unset waits forever.
    pub run_timeout_secs: Option<u64>,
    /// Copy live nodes and pods from the cluster snapshot.
    pub include_live_pods_and_nodes: bool,
    /// Synthetic nodes to add, cloned from the manifest node template.
    pub fake_nodes: u32,
    pub plan_output: PathBuf,
    pub cluster_snapshot: Option<PathBuf>,
    pub manifests: Vec<PathBuf>,
    pub engine: EngineConfig,
}

/// Scoring weights for the built-in decision engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub bin_packing: f64,
    pub balance: f64,
}

impl Default for SimonConfig {
    fn default() -> Self {
        Self {
            scheduler_name: DEFAULT_SCHEDULER_NAME.to_string(),
            fake_node_prefix: FAKE_NODE_NAME_PREFIX.to_string(),
            settle_delay_ms: 100,
            run_timeout_secs: None,
            include_live_pods_and_nodes: true,
            fake_nodes: 0,
            plan_output: PathBuf::from(PLAN_FILE_NAME),
            cluster_snapshot: None,
            manifests: Vec::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bin_packing: 0.6,
            balance: 0.4,
        }
    }
}

impl SimonConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SimonConfig::from_toml("").unwrap();
        assert_eq!(config, SimonConfig::default());
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.run_timeout(), None);
    }

    #[test]
    fn parses_overrides() {
        let config = SimonConfig::from_toml(
            r#"
scheduler_name = "planner"
fake_nodes = 3
run_timeout_secs = 30
manifests = ["apps/"]

[engine]
bin_packing = 1.0
"#,
        )
        .unwrap();
        assert_eq!(config.scheduler_name, "planner");
        assert_eq!(config.fake_nodes, 3);
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.manifests, vec![PathBuf::from("apps/")]);
        assert_eq!(config.engine.bin_packing, 1.0);
        assert_eq!(config.engine.balance, 0.4);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = SimonConfig::default();
        config.cluster_snapshot = Some(PathBuf::from("cluster.json"));
        let text = config.to_toml_string().unwrap();
        assert_eq!(SimonConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(SimonConfig::from_toml("fake_nodes = \"many\"").is_err());
    }
}
