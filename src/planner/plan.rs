//! Computed resource plans

use serde::{Deserialize, Serialize};

use crate::cluster::RemoteCluster;

/// A concrete cluster request for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// Whether the task runs remotely
    pub enabled: bool,
    /// Cluster the plan targets
    pub cluster: RemoteCluster,
    /// Chosen architecture name
    pub architecture: String,
    /// Chosen queue name
    pub queue_name: String,
    /// Number of nodes (one job per node)
    pub node_count: u32,
    /// Cores requested per node
    pub min_cores_per_node: u32,
    /// RAM requested per node, GB
    pub min_gigs_per_node: f64,
    /// Cores per node that can run a subtask at once
    pub active_cores_per_node: u32,
    /// Subtasks each active core works through
    pub subtasks_per_core: f64,
    /// RAM per subtask, GB
    pub gigs_per_subtask: f64,
    /// Requested wall time in hours, a multiple of 0.25
    pub requested_wall_hours: f64,
    /// Requested wall time as `HH:MM:SS`
    pub wall_time: String,
    /// Billing group
    pub group: String,
    /// Estimated cost in cost-factor units
    pub estimated_cost: f64,
}

impl ResourcePlan {
    /// Combine the plans of several tasks that share one submission: the
    /// longest wall time and queue, the most active cores, summed nodes and cost.
    pub fn aggregate(plans: &[ResourcePlan]) -> Option<ResourcePlan> {
        let mut iter = plans.iter();
        let mut combined = iter.next()?.clone();
        for plan in iter {
            if plan.requested_wall_hours > combined.requested_wall_hours {
                combined.requested_wall_hours = plan.requested_wall_hours;
                combined.wall_time = plan.wall_time.clone();
                combined.queue_name = plan.queue_name.clone();
            }
            combined.active_cores_per_node = combined
                .active_cores_per_node
                .max(plan.active_cores_per_node);
            combined.subtasks_per_core = combined.subtasks_per_core.max(plan.subtasks_per_core);
            combined.node_count += plan.node_count;
            combined.estimated_cost += plan.estimated_cost;
            combined.enabled |= plan.enabled;
        }
        Some(combined)
    }
}

/// Format hours as a PBS `HH:MM:SS` wall time
pub fn format_wall_time(hours: f64) -> String {
    let seconds = (hours * 3600.0).round().max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Parse a `HH:MM:SS` (or `HH:MM`) wall time into hours
pub fn parse_wall_time(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<u64>().ok()?),
        [h, m] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, 0),
        _ => return None,
    };
    Some((h * 3600 + m * 60 + s) as f64 / 3600.0)
}
