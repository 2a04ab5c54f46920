//! Caller-supplied resource requests

use serde::{Deserialize, Serialize};

use super::ArchitectureOptimizer;
use crate::error::{BatchPlanError, Result};

fn default_true() -> bool {
    true
}

/// What a task needs from the cluster, per subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Whether the task runs remotely at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Worst-case wall time of one subtask, in hours
    pub max_wall_hours: f64,
    /// Typical wall time of one subtask, in hours
    pub typical_wall_hours: f64,
    /// RAM needed by one subtask, in GB
    pub gigs_per_subtask: f64,
    /// Strategy used when no architecture is pinned
    #[serde(default)]
    pub optimizer: ArchitectureOptimizer,
    /// Pack several subtasks per node (otherwise one subtask per node)
    #[serde(default = "default_true")]
    pub node_sharing: bool,
    /// Divide wall time by cores per node when not node-sharing
    #[serde(default = "default_true")]
    pub wall_time_scaling: bool,
    /// Pinned architecture name
    #[serde(default)]
    pub architecture: Option<String>,
    /// Pinned queue name
    #[serde(default)]
    pub queue: Option<String>,
    /// Minimum subtasks per core
    #[serde(default)]
    pub subtasks_per_core: Option<f64>,
    /// Upper bound on requested nodes
    #[serde(default)]
    pub max_nodes: Option<u32>,
    /// Cores per node to request (cloud clusters only)
    #[serde(default)]
    pub min_cores_per_node: Option<u32>,
    /// RAM per node to request (cloud clusters only)
    #[serde(default)]
    pub min_gigs_per_node: Option<f64>,
}

impl ResourceRequest {
    /// Create a node-sharing request with no overrides
    pub fn new(max_wall_hours: f64, typical_wall_hours: f64, gigs_per_subtask: f64) -> Self {
        Self {
            enabled: true,
            max_wall_hours,
            typical_wall_hours,
            gigs_per_subtask,
            optimizer: ArchitectureOptimizer::default(),
            node_sharing: true,
            wall_time_scaling: true,
            architecture: None,
            queue: None,
            subtasks_per_core: None,
            max_nodes: None,
            min_cores_per_node: None,
            min_gigs_per_node: None,
        }
    }

    /// Reject values the planner cannot work with
    pub fn validate(&self) -> Result<()> {
        let positive = |value: f64, what: &str| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(BatchPlanError::InvalidRequest(format!(
                    "{} must be positive, got {}",
                    what, value
                )))
            }
        };
        positive(self.max_wall_hours, "max wall time")?;
        positive(self.typical_wall_hours, "typical wall time")?;
        if self.node_sharing {
            positive(self.gigs_per_subtask, "gigs per subtask")?;
        }
        if let Some(spc) = self.subtasks_per_core {
            positive(spc, "subtasks per core")?;
        }
        if self.max_nodes == Some(0) {
            return Err(BatchPlanError::InvalidRequest(
                "max nodes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults() {
        let request: ResourceRequest = serde_json::from_str(
            r#"{"max_wall_hours": 4.5, "typical_wall_hours": 0.5, "gigs_per_subtask": 6}"#,
        )
        .unwrap();
        assert!(request.enabled);
        assert!(request.node_sharing);
        assert!(request.wall_time_scaling);
        assert_eq!(request.optimizer, ArchitectureOptimizer::Cost);
        assert_eq!(request, ResourceRequest::new(4.5, 0.5, 6.0));
    }

    #[test]
    fn test_deserialize_optimizer_name() {
        let request: ResourceRequest = serde_json::from_str(
            r#"{"max_wall_hours": 1, "typical_wall_hours": 1, "gigs_per_subtask": 1,
                "optimizer": "queue_depth", "architecture": "san"}"#,
        )
        .unwrap();
        assert_eq!(request.optimizer, ArchitectureOptimizer::QueueDepth);
        assert_eq!(request.architecture.as_deref(), Some("san"));
    }

    #[test]
    fn test_validate() {
        assert!(ResourceRequest::new(4.5, 0.5, 6.0).validate().is_ok());
        assert!(ResourceRequest::new(0.0, 0.5, 6.0).validate().is_err());
        assert!(ResourceRequest::new(4.5, -1.0, 6.0).validate().is_err());

        let mut request = ResourceRequest::new(4.5, 0.5, 0.0);
        assert!(request.validate().is_err());
        request.node_sharing = false;
        assert!(request.validate().is_ok());

        request.max_nodes = Some(0);
        assert!(request.validate().is_err());
    }
}
