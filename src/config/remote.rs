//! Remote execution configuration
//!
//! Loaded from a JSON file. Every field has a default so a config only
//! names what differs from a stock NAS setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cluster::RemoteCluster;
use crate::error::{IoResultExt, Result};
use crate::planner::{ArchitectureOptimizer, ResourceRequest, DEFAULT_DIRECTORATE};

/// Where queue commands run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum QueueCommandMode {
    /// On this machine
    #[default]
    Local,
    /// On a front end, over ssh
    Remote {
        /// Host to ssh to
        host: String,
    },
}

/// Per-property overrides applied on top of a [`ResourceRequest`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceOverrides {
    /// Queue name
    pub queue: Option<String>,
    /// Architecture name
    pub architecture: Option<String>,
    /// Subtasks per core
    pub subtasks_per_core: Option<f64>,
    /// Node ceiling
    pub max_nodes: Option<u32>,
    /// Cores per node (cloud)
    pub min_cores_per_node: Option<u32>,
    /// RAM per node (cloud)
    pub min_gigs_per_node: Option<f64>,
    /// Architecture optimizer
    pub optimizer: Option<ArchitectureOptimizer>,
}

impl ResourceOverrides {
    /// Copy of `request` with every set override taking precedence
    pub fn apply(&self, request: &ResourceRequest) -> ResourceRequest {
        let mut request = request.clone();
        if let Some(queue) = &self.queue {
            request.queue = Some(queue.clone());
        }
        if let Some(architecture) = &self.architecture {
            request.architecture = Some(architecture.clone());
        }
        if self.subtasks_per_core.is_some() {
            request.subtasks_per_core = self.subtasks_per_core;
        }
        if self.max_nodes.is_some() {
            request.max_nodes = self.max_nodes;
        }
        if self.min_cores_per_node.is_some() {
            request.min_cores_per_node = self.min_cores_per_node;
        }
        if self.min_gigs_per_node.is_some() {
            request.min_gigs_per_node = self.min_gigs_per_node;
        }
        if let Some(optimizer) = self.optimizer {
            request.optimizer = optimizer;
        }
        request
    }
}

/// Identity, command paths and overrides for one remote execution setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Billing group
    pub group: String,
    /// User the jobs belong to
    pub owner: String,
    /// Host jobs are submitted from
    pub host: String,
    /// Cluster to use instead of detecting it
    pub cluster: Option<RemoteCluster>,
    /// Where queue commands run
    pub queue_command_mode: QueueCommandMode,
    /// `qsub` path
    pub qsub_path: String,
    /// `qstat` path
    pub qstat_path: String,
    /// `qdel` path
    pub qdel_path: String,
    /// Submission timeout, seconds
    pub submit_timeout_secs: u64,
    /// Queue query timeout, seconds
    pub query_timeout_secs: u64,
    /// Job wrapper script
    pub script_path: Option<PathBuf>,
    /// Home directory passed to the script
    pub home_dir: Option<PathBuf>,
    /// Directory holding task state files
    pub state_dir: Option<PathBuf>,
    /// Configuration file passed to the script; defaults to the file this
    /// configuration was loaded from
    pub config_path: Option<PathBuf>,
    /// Directory for PBS output logs
    pub pbs_log_dir: Option<PathBuf>,
    /// Directory for algorithm logs
    pub algorithm_log_dir: Option<PathBuf>,
    /// Variables passed to jobs with `qsub -v`
    pub environment: BTreeMap<String, String>,
    /// Where `qs` writes its report; enables queue metrics when set
    pub queue_metrics_csv: Option<PathBuf>,
    /// Directorate column read from the `qs` report
    pub directorate: String,
    /// Resource overrides
    pub overrides: ResourceOverrides,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            group: String::new(),
            owner: env::var("USER").unwrap_or_default(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_default(),
            cluster: None,
            queue_command_mode: QueueCommandMode::Local,
            qsub_path: "/PBS/bin/qsub".to_string(),
            qstat_path: "/PBS/bin/qstat".to_string(),
            qdel_path: "/PBS/bin/qdel".to_string(),
            submit_timeout_secs: 60,
            query_timeout_secs: 30,
            script_path: None,
            home_dir: None,
            state_dir: None,
            config_path: None,
            pbs_log_dir: None,
            algorithm_log_dir: None,
            environment: BTreeMap::new(),
            queue_metrics_csv: None,
            directorate: DEFAULT_DIRECTORATE.to_string(),
            overrides: ResourceOverrides::default(),
        }
    }
}

impl RemoteConfig {
    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_path(path)?;
        let mut config: RemoteConfig = serde_json::from_str(&text)?;
        config
            .config_path
            .get_or_insert_with(|| path.to_path_buf());
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Submission timeout
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    /// Queue query timeout
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "group": "s1234",
                "owner": "user",
                "cluster": "aws",
                "queue_command_mode": {{ "mode": "remote", "host": "pfe" }},
                "overrides": {{ "queue": "R123", "optimizer": "QUEUE_TIME" }}
            }}"#
        )
        .unwrap();

        let config = RemoteConfig::load(file.path()).unwrap();
        assert_eq!(config.group, "s1234");
        assert_eq!(config.cluster, Some(RemoteCluster::Aws));
        assert_eq!(
            config.queue_command_mode,
            QueueCommandMode::Remote {
                host: "pfe".to_string()
            }
        );
        assert_eq!(config.qsub_path, "/PBS/bin/qsub");
        assert_eq!(config.submit_timeout(), Duration::from_secs(60));
        assert_eq!(config.directorate, "SMD");
        assert_eq!(config.overrides.optimizer, Some(ArchitectureOptimizer::QueueTime));
        assert_eq!(config.config_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RemoteConfig::load(Path::new("/nonexistent/batchplan.json")).unwrap_err();
        assert!(err.path().is_some());
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(RemoteConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut request = ResourceRequest::new(4.0, 1.0, 2.0);
        request.queue = Some("low".to_string());
        request.max_nodes = Some(10);

        let overrides = ResourceOverrides {
            queue: Some("long".to_string()),
            architecture: Some("has".to_string()),
            optimizer: Some(ArchitectureOptimizer::Cores),
            ..Default::default()
        };
        let applied = overrides.apply(&request);
        assert_eq!(applied.queue.as_deref(), Some("long"));
        assert_eq!(applied.architecture.as_deref(), Some("has"));
        assert_eq!(applied.max_nodes, Some(10));
        assert_eq!(applied.optimizer, ArchitectureOptimizer::Cores);
        assert_eq!(request.queue.as_deref(), Some("low"));
    }
}
