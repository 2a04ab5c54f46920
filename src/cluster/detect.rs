//! Remote cluster detection
//!
//! The cluster is resolved once per [`ClusterContext`] and cached in it. An
//! explicit override wins, then the `BATCHPLAN_CLUSTER` environment variable,
//! then hints from the host name and environment. NAS is the fallback.

use std::cell::OnceCell;
use std::env;

use super::RemoteCluster;

/// Environment variable naming the cluster explicitly
pub const CLUSTER_ENV_VAR: &str = "BATCHPLAN_CLUSTER";

/// Owned, lazily-resolved cluster identity
#[derive(Debug, Default)]
pub struct ClusterContext {
    override_cluster: Option<RemoteCluster>,
    resolved: OnceCell<RemoteCluster>,
}

impl ClusterContext {
    /// Create a context, optionally pinned to a cluster
    pub fn new(override_cluster: Option<RemoteCluster>) -> Self {
        Self {
            override_cluster,
            resolved: OnceCell::new(),
        }
    }

    /// The cluster this process talks to, detected on first use
    pub fn cluster(&self) -> RemoteCluster {
        *self.resolved.get_or_init(|| {
            let cluster = match self.override_cluster {
                Some(cluster) => cluster,
                None => {
                    let host = hostname::get()
                        .map(|h| h.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    detect_cluster(|key| env::var(key).ok(), &host)
                }
            };
            tracing::debug!("Resolved remote cluster: {}", cluster);
            cluster
        })
    }

    /// Forget the cached cluster so the next call detects again
    pub fn reset(&mut self) {
        self.resolved = OnceCell::new();
    }
}

/// Detect the cluster from an environment lookup and a host name
pub fn detect_cluster<F>(env_lookup: F, host: &str) -> RemoteCluster
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env_lookup(CLUSTER_ENV_VAR) {
        match value.parse() {
            Ok(cluster) => return cluster,
            Err(e) => tracing::warn!("Ignoring {}: {}", CLUSTER_ENV_VAR, e),
        }
    }

    let host = host.to_ascii_lowercase();
    let nas_host = host.starts_with("pfe")
        || host.starts_with("lfe")
        || host.starts_with("afe")
        || host.ends_with(".nas.nasa.gov");
    if nas_host || (env_lookup("PBS_JOBID").is_some() && env_lookup("AWS_REGION").is_none()) {
        return RemoteCluster::Nas;
    }

    if env_lookup("AWS_REGION").is_some()
        || env_lookup("AWS_EXECUTION_ENV").is_some()
        || host.ends_with(".compute.internal")
    {
        return RemoteCluster::Aws;
    }

    RemoteCluster::Nas
}
