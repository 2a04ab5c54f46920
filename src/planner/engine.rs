//! Resource planning
//!
//! Turns a [`ResourceRequest`] and a subtask count into a [`ResourcePlan`]:
//!
//! 1. pick the architecture (pinned, or chosen by the request's optimizer)
//! 2. size the node and count the cores that fit a subtask's RAM
//! 3. work out subtasks per core and the node count
//! 4. round the wall time up to a quarter hour and pick a queue
//! 5. estimate cost
//!
//! Planning is pure computation and safe to repeat.

use super::{format_wall_time, QueueMetrics, ResourcePlan, ResourceRequest, StaticQueueMetrics};
use crate::cluster::{
    architecture_by_name, lookup_queue, queue_for_wall_time, sorted_by_cost, sorted_by_max_cores,
    sorted_by_ram_then_cost, with_sufficient_ram, NodeArchitecture, QueueLookup, RemoteCluster,
};
use crate::error::{BatchPlanError, Result};
use crate::planner::ArchitectureOptimizer;

/// Computes resource plans
pub struct ResourcePlanner {
    metrics: Box<dyn QueueMetrics>,
    group: String,
}

impl ResourcePlanner {
    /// Create a planner billing to `group`, with no queue metrics
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            metrics: Box::new(StaticQueueMetrics::new()),
            group: group.into(),
        }
    }

    /// Use a queue metrics source for the queue-based optimizers
    pub fn with_metrics(mut self, metrics: Box<dyn QueueMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Queue metrics in use
    pub fn metrics(&self) -> &dyn QueueMetrics {
        self.metrics.as_ref()
    }

    /// Refresh queue metrics if their source is due
    pub fn refresh_metrics(&mut self) -> Result<()> {
        self.metrics.refresh()
    }

    /// Billing group written into plans
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Plan `total_subtasks` subtasks of `request` on `cluster`
    pub fn plan(
        &self,
        request: &ResourceRequest,
        total_subtasks: u32,
        cluster: RemoteCluster,
    ) -> Result<ResourcePlan> {
        request.validate()?;
        let architecture = self.select_architecture(request, total_subtasks, cluster)?;
        let plan = self.plan_for_architecture(request, total_subtasks, architecture)?;
        tracing::info!(
            "Planned {} subtasks: {} x {} nodes, {} active cores/node, {} in queue {}, cost {:.3}",
            total_subtasks,
            plan.node_count,
            plan.architecture,
            plan.active_cores_per_node,
            plan.wall_time,
            plan.queue_name,
            plan.estimated_cost
        );
        Ok(plan)
    }

    /// Resolve the pinned architecture or run the optimizer over candidates
    pub fn select_architecture(
        &self,
        request: &ResourceRequest,
        total_subtasks: u32,
        cluster: RemoteCluster,
    ) -> Result<&'static NodeArchitecture> {
        if let Some(name) = &request.architecture {
            let arch = architecture_by_name(cluster, name).ok_or_else(|| {
                BatchPlanError::UnknownArchitecture {
                    name: name.clone(),
                    cluster: cluster.to_string(),
                }
            })?;
            if request.node_sharing && !arch.has_sufficient_ram(request.gigs_per_subtask) {
                return Err(BatchPlanError::InsufficientRam {
                    architecture: Some(arch.name.to_string()),
                    gigs_per_subtask: request.gigs_per_subtask,
                });
            }
            return Ok(arch);
        }

        let candidates = candidate_architectures(request, cluster)?;
        request
            .optimizer
            .select(self, request, total_subtasks, cluster, &candidates)
    }

    /// Plan with the architecture already decided
    pub fn plan_for_architecture(
        &self,
        request: &ResourceRequest,
        total_subtasks: u32,
        arch: &'static NodeArchitecture,
    ) -> Result<ResourcePlan> {
        let (min_cores, min_gigs) = node_size(arch, request);
        let active_cores = active_cores_per_node(request, arch, min_cores)?;
        let subtasks_per_core = subtasks_per_core(request, total_subtasks, active_cores);
        let node_count = node_count(request, total_subtasks, subtasks_per_core, active_cores);
        let hours = round_up_to_quarter_hour(bare_wall_hours(request, subtasks_per_core, min_cores));
        let queue_name = select_queue(request, hours, arch.cluster)?;
        let estimated_cost = arch.cost_factor
            * (f64::from(min_cores) / f64::from(arch.min_cores))
            * f64::from(node_count)
            * hours;

        Ok(ResourcePlan {
            enabled: request.enabled,
            cluster: arch.cluster,
            architecture: arch.name.to_string(),
            queue_name,
            node_count,
            min_cores_per_node: min_cores,
            min_gigs_per_node: min_gigs,
            active_cores_per_node: active_cores,
            subtasks_per_core,
            gigs_per_subtask: request.gigs_per_subtask,
            requested_wall_hours: hours,
            wall_time: format_wall_time(hours),
            group: self.group.clone(),
            estimated_cost,
        })
    }
}

fn candidate_architectures(
    request: &ResourceRequest,
    cluster: RemoteCluster,
) -> Result<Vec<&'static NodeArchitecture>> {
    if !request.node_sharing {
        return Ok(sorted_by_max_cores(cluster));
    }
    let sorted = match request.optimizer {
        ArchitectureOptimizer::Cost => sorted_by_cost(cluster),
        _ => sorted_by_ram_then_cost(cluster),
    };
    let candidates = with_sufficient_ram(sorted, request.gigs_per_subtask);
    if candidates.is_empty() {
        return Err(BatchPlanError::InsufficientRam {
            architecture: None,
            gigs_per_subtask: request.gigs_per_subtask,
        });
    }
    Ok(candidates)
}

/// Cores and GB to request per node. NAS allocates whole nodes; AWS sizes
/// the instance to the request.
fn node_size(arch: &NodeArchitecture, request: &ResourceRequest) -> (u32, f64) {
    match arch.cluster {
        RemoteCluster::Nas => (arch.min_cores, arch.min_gigs()),
        RemoteCluster::Aws => {
            let cores = match request.min_cores_per_node {
                Some(cores) => cores,
                None => {
                    let third = arch.max_cores.div_ceil(3);
                    let required_gigs = request
                        .min_gigs_per_node
                        .unwrap_or(0.0)
                        .max(request.gigs_per_subtask);
                    let for_ram = (required_gigs / arch.gigs_per_core).ceil() as u32;
                    third.max(for_ram)
                }
            }
            .clamp(arch.min_cores, arch.max_cores);
            let gigs = request
                .min_gigs_per_node
                .unwrap_or(0.0)
                .max(f64::from(cores) * arch.gigs_per_core);
            (cores, gigs)
        }
    }
}

/// Subtasks that fit in the node's RAM at once, capped by its cores. A node
/// too small for a single subtask cannot be planned.
fn active_cores_per_node(
    request: &ResourceRequest,
    arch: &NodeArchitecture,
    min_cores: u32,
) -> Result<u32> {
    if !request.node_sharing {
        return Ok(1);
    }
    let node_gigs = arch.gigs_per_core * f64::from(min_cores);
    if node_gigs < request.gigs_per_subtask {
        return Err(BatchPlanError::InsufficientRam {
            architecture: Some(arch.name.to_string()),
            gigs_per_subtask: request.gigs_per_subtask,
        });
    }
    let fit = (node_gigs / request.gigs_per_subtask).floor();
    Ok((fit.min(f64::from(min_cores)) as u32).max(1))
}

fn subtasks_per_core(request: &ResourceRequest, total_subtasks: u32, active_cores: u32) -> f64 {
    let mut spc = request.max_wall_hours / request.typical_wall_hours;
    if let Some(max_nodes) = request.max_nodes {
        let needed = f64::from(total_subtasks) / (f64::from(active_cores) * f64::from(max_nodes));
        spc = spc.max(needed);
    }
    if let Some(requested) = request.subtasks_per_core {
        if requested >= spc {
            spc = requested;
        } else {
            tracing::warn!(
                "Subtasks per core override {} is less than the required {}, ignoring it",
                requested,
                spc
            );
        }
    }
    spc
}

fn node_count(
    request: &ResourceRequest,
    total_subtasks: u32,
    subtasks_per_core: f64,
    active_cores: u32,
) -> u32 {
    let per_node = subtasks_per_core * f64::from(active_cores);
    let nodes = (f64::from(total_subtasks) / per_node).max(1.0).ceil() as u32;
    match request.max_nodes {
        Some(max_nodes) => nodes.min(max_nodes),
        None => nodes,
    }
}

fn bare_wall_hours(request: &ResourceRequest, subtasks_per_core: f64, min_cores: u32) -> f64 {
    let hours = request
        .max_wall_hours
        .max(subtasks_per_core * request.typical_wall_hours);
    if !request.node_sharing && request.wall_time_scaling {
        hours / f64::from(min_cores)
    } else {
        hours
    }
}

/// Round up to the scheduler's quarter-hour granularity
pub fn round_up_to_quarter_hour(hours: f64) -> f64 {
    0.25 * (4.0 * hours).ceil()
}

fn select_queue(request: &ResourceRequest, hours: f64, cluster: RemoteCluster) -> Result<String> {
    let Some(name) = &request.queue else {
        return queue_for_wall_time(cluster, hours)
            .map(|q| q.name.to_string())
            .ok_or_else(|| BatchPlanError::NoQueueForWallTime {
                wall_time_hours: hours,
                cluster: cluster.to_string(),
            });
    };

    match lookup_queue(cluster, name) {
        QueueLookup::Reserved => Ok(name.clone()),
        QueueLookup::Unknown => {
            tracing::warn!("Queue '{}' is not in the {} catalog, using it as given", name, cluster);
            Ok(name.clone())
        }
        QueueLookup::Known(queue) if queue.max_wall_hours >= hours => Ok(name.clone()),
        QueueLookup::Known(queue) => Err(BatchPlanError::QueueWallTimeExceeded {
            queue: name.clone(),
            max_hours: queue.max_wall_hours,
            wall_time_hours: hours,
        }),
    }
}
