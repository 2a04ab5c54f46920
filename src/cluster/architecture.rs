//! Node architecture catalog

use serde::Serialize;
use std::cmp::Ordering;

use super::RemoteCluster;

/// A node type offered by a cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeArchitecture {
    /// Cluster-specific model name, as passed to the scheduler
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Smallest core count that can be requested per node
    pub min_cores: u32,
    /// Largest core count per node
    pub max_cores: u32,
    /// RAM per core in GB
    pub gigs_per_core: f64,
    /// Relative cost weight (SBU or currency units per node-hour)
    pub cost_factor: f64,
    /// Owning cluster
    pub cluster: RemoteCluster,
}

impl NodeArchitecture {
    /// RAM of a fully-populated node, rounded to whole GB
    pub fn max_gigs(&self) -> u32 {
        (self.gigs_per_core * f64::from(self.max_cores)).round() as u32
    }

    /// RAM of the smallest requestable node
    pub fn min_gigs(&self) -> f64 {
        self.gigs_per_core * f64::from(self.min_cores)
    }

    /// Whether one subtask of this size fits on a node at all
    pub fn has_sufficient_ram(&self, gigs_per_subtask: f64) -> bool {
        f64::from(self.max_gigs()) >= gigs_per_subtask
    }

    /// Short prefix used by NAS reporting tools ("san", "sky", "rom", ...)
    pub fn short_name(&self) -> &'static str {
        self.name.get(..3).unwrap_or(self.name)
    }
}

const fn nas(
    name: &'static str,
    description: &'static str,
    cores: u32,
    gigs_per_core: f64,
    cost_factor: f64,
) -> NodeArchitecture {
    NodeArchitecture {
        name,
        description,
        min_cores: cores,
        max_cores: cores,
        gigs_per_core,
        cost_factor,
        cluster: RemoteCluster::Nas,
    }
}

const fn aws(
    name: &'static str,
    description: &'static str,
    min_cores: u32,
    max_cores: u32,
    gigs_per_core: f64,
    cost_factor: f64,
) -> NodeArchitecture {
    NodeArchitecture {
        name,
        description,
        min_cores,
        max_cores,
        gigs_per_core,
        cost_factor,
        cluster: RemoteCluster::Aws,
    }
}

static NAS_ARCHITECTURES: [NodeArchitecture; 7] = [
    nas("san", "Sandy Bridge", 16, 2.0, 0.47),
    nas("ivy", "Ivy Bridge", 20, 3.2, 0.66),
    nas("bro", "Broadwell", 28, 4.57, 1.00),
    nas("has", "Haswell", 24, 5.33, 0.80),
    nas("sky_ele", "Skylake", 40, 4.8, 1.59),
    nas("cas_ait", "Cascade Lake", 40, 4.0, 1.64),
    nas("rom_ait", "AMD Rome", 128, 4.0, 4.06),
];

static AWS_ARCHITECTURES: [NodeArchitecture; 3] = [
    aws("c5", "Compute optimized", 4, 48, 4.0, 0.308),
    aws("m5", "General purpose", 2, 48, 8.0, 0.344),
    aws("r5", "Memory optimized", 1, 48, 16.0, 0.452),
];

/// All architectures for a cluster, in catalog order
pub fn architectures(cluster: RemoteCluster) -> &'static [NodeArchitecture] {
    match cluster {
        RemoteCluster::Nas => &NAS_ARCHITECTURES,
        RemoteCluster::Aws => &AWS_ARCHITECTURES,
    }
}

/// Look up an architecture by model name (case-insensitive)
pub fn architecture_by_name(cluster: RemoteCluster, name: &str) -> Option<&'static NodeArchitecture> {
    let name = name.trim();
    architectures(cluster)
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
}

/// Look up an architecture on any cluster
pub fn find_architecture(name: &str) -> Option<&'static NodeArchitecture> {
    architecture_by_name(RemoteCluster::Nas, name)
        .or_else(|| architecture_by_name(RemoteCluster::Aws, name))
}

fn by_cost(a: &NodeArchitecture, b: &NodeArchitecture) -> Ordering {
    a.cost_factor.total_cmp(&b.cost_factor)
}

/// Architectures sorted by ascending cost factor
pub fn sorted_by_cost(cluster: RemoteCluster) -> Vec<&'static NodeArchitecture> {
    let mut list: Vec<_> = architectures(cluster).iter().collect();
    list.sort_by(|a, b| by_cost(a, b));
    list
}

/// Architectures sorted by descending max cores per node
pub fn sorted_by_max_cores(cluster: RemoteCluster) -> Vec<&'static NodeArchitecture> {
    let mut list: Vec<_> = architectures(cluster).iter().collect();
    list.sort_by(|a, b| b.max_cores.cmp(&a.max_cores));
    list
}

/// Architectures sorted by ascending RAM per core, then ascending cost
pub fn sorted_by_ram_then_cost(cluster: RemoteCluster) -> Vec<&'static NodeArchitecture> {
    let mut list: Vec<_> = architectures(cluster).iter().collect();
    list.sort_by(|a, b| {
        a.gigs_per_core
            .total_cmp(&b.gigs_per_core)
            .then_with(|| by_cost(a, b))
    });
    list
}

/// Keep only architectures whose full node can hold one subtask
pub fn with_sufficient_ram(
    candidates: Vec<&'static NodeArchitecture>,
    gigs_per_subtask: f64,
) -> Vec<&'static NodeArchitecture> {
    candidates
        .into_iter()
        .filter(|a| a.has_sufficient_ram(gigs_per_subtask))
        .collect()
}
