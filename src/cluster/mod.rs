//! Cluster catalog
//!
//! Static tables of node architectures and batch queues for each supported
//! cluster, plus detection of which cluster this process is talking to.

mod architecture;
mod detect;
mod queues;

pub use architecture::*;
pub use detect::*;
pub use queues::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BatchPlanError;

/// Supported remote cluster classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteCluster {
    /// NAS PBS cluster (whole-node allocation)
    Nas,
    /// AWS elastic cluster (per-core allocation)
    Aws,
}

impl RemoteCluster {
    /// Get cluster name
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCluster::Nas => "NAS",
            RemoteCluster::Aws => "AWS",
        }
    }

    /// True when nodes are sized per request rather than allocated whole
    pub fn is_cloud(&self) -> bool {
        matches!(self, RemoteCluster::Aws)
    }
}

impl fmt::Display for RemoteCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RemoteCluster {
    type Err = BatchPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nas" => Ok(RemoteCluster::Nas),
            "aws" => Ok(RemoteCluster::Aws),
            other => Err(BatchPlanError::config(format!(
                "Unknown remote cluster '{}'",
                other
            ))),
        }
    }
}
