//! Architecture selection strategies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ResourcePlan, ResourcePlanner, ResourceRequest};
use crate::cluster::{NodeArchitecture, RemoteCluster};
use crate::error::{BatchPlanError, Result};

/// How to pick an architecture when the request does not pin one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArchitectureOptimizer {
    /// Waste the fewest cores to RAM limits
    Cores,
    /// Shortest reported queue depth (NAS only)
    QueueDepth,
    /// Shortest wall time scaled by queue-time expansion (NAS only)
    QueueTime,
    /// Lowest estimated cost
    #[default]
    Cost,
}

impl ArchitectureOptimizer {
    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cores => "CORES",
            Self::QueueDepth => "QUEUE_DEPTH",
            Self::QueueTime => "QUEUE_TIME",
            Self::Cost => "COST",
        }
    }

    /// Pick one architecture from `candidates`, which the caller has already
    /// filtered for RAM and sorted. Ties go to the earliest candidate.
    pub fn select(
        self,
        planner: &ResourcePlanner,
        request: &ResourceRequest,
        total_subtasks: u32,
        cluster: RemoteCluster,
        candidates: &[&'static NodeArchitecture],
    ) -> Result<&'static NodeArchitecture> {
        let selected = match self {
            Self::Cost => return select_by_cost(planner, request, total_subtasks, candidates),
            Self::Cores if !request.node_sharing => {
                tracing::info!("CORES optimizer needs node sharing, using COST");
                None
            }
            Self::Cores => first_optimum(
                candidates.iter().map(|a| {
                    (*a, Some((a.gigs_per_core / request.gigs_per_subtask).min(1.0)))
                }),
                |candidate, best| candidate > best,
            ),
            Self::QueueDepth | Self::QueueTime if cluster.is_cloud() => {
                tracing::info!("{} optimizer is not available on {}, using COST", self, cluster);
                None
            }
            Self::QueueDepth => first_optimum(
                candidates
                    .iter()
                    .map(|a| (*a, planner.metrics().queue_depth(a))),
                |candidate, best| candidate < best,
            ),
            Self::QueueTime => {
                let mut scored = Vec::with_capacity(candidates.len());
                for &arch in candidates {
                    let Some(expansion) = planner.metrics().queue_time_expansion(arch) else {
                        scored.push((arch, None));
                        continue;
                    };
                    match trial_plan(planner, request, total_subtasks, arch) {
                        Ok(plan) => {
                            scored.push((arch, Some(plan.requested_wall_hours * expansion)))
                        }
                        Err(e) => {
                            tracing::debug!("Architecture {} cannot be planned: {}", arch.name, e);
                            scored.push((arch, None));
                        }
                    }
                }
                first_optimum(scored.into_iter(), |candidate, best| candidate < best)
            }
        };

        match selected {
            Some(arch) => {
                tracing::info!("{} optimizer selected architecture {}", self, arch.name);
                Ok(arch)
            }
            None => {
                tracing::debug!("{} optimizer made no selection, using COST", self);
                select_by_cost(planner, request, total_subtasks, candidates)
            }
        }
    }
}

/// Plan as though `arch` were pinned and a full node requested
fn trial_plan(
    planner: &ResourcePlanner,
    request: &ResourceRequest,
    total_subtasks: u32,
    arch: &'static NodeArchitecture,
) -> Result<ResourcePlan> {
    let mut trial = request.clone();
    trial.architecture = Some(arch.name.to_string());
    trial.min_cores_per_node = Some(arch.max_cores);
    trial.min_gigs_per_node = Some(f64::from(arch.max_gigs()));
    planner.plan_for_architecture(&trial, total_subtasks, arch)
}

fn select_by_cost(
    planner: &ResourcePlanner,
    request: &ResourceRequest,
    total_subtasks: u32,
    candidates: &[&'static NodeArchitecture],
) -> Result<&'static NodeArchitecture> {
    let mut scored = Vec::with_capacity(candidates.len());
    let mut last_error = None;
    for &arch in candidates {
        match trial_plan(planner, request, total_subtasks, arch) {
            Ok(plan) => scored.push((arch, Some(plan.estimated_cost))),
            Err(e) => {
                tracing::debug!("Architecture {} cannot be planned: {}", arch.name, e);
                last_error = Some(e);
            }
        }
    }
    match first_optimum(scored.into_iter(), |candidate, best| candidate < best) {
        Some(arch) => {
            tracing::info!("COST optimizer selected architecture {}", arch.name);
            Ok(arch)
        }
        None => Err(last_error.unwrap_or(BatchPlanError::InsufficientRam {
            architecture: None,
            gigs_per_subtask: request.gigs_per_subtask,
        })),
    }
}

/// First candidate whose score strictly beats every earlier one; unscored
/// candidates are skipped
fn first_optimum<I>(scored: I, better: fn(f64, f64) -> bool) -> Option<&'static NodeArchitecture>
where
    I: Iterator<Item = (&'static NodeArchitecture, Option<f64>)>,
{
    let mut best: Option<(&'static NodeArchitecture, f64)> = None;
    for (arch, score) in scored {
        let Some(score) = score else { continue };
        match best {
            Some((_, best_score)) if !better(score, best_score) => {}
            _ => best = Some((arch, score)),
        }
    }
    best.map(|(arch, _)| arch)
}

impl fmt::Display for ArchitectureOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArchitectureOptimizer {
    type Err = BatchPlanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "CORES" => Ok(Self::Cores),
            "QUEUEDEPTH" => Ok(Self::QueueDepth),
            "QUEUETIME" => Ok(Self::QueueTime),
            "COST" => Ok(Self::Cost),
            _ => Err(BatchPlanError::UnknownOptimizer(s.to_string())),
        }
    }
}

impl TryFrom<String> for ArchitectureOptimizer {
    type Error = BatchPlanError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArchitectureOptimizer> for String {
    fn from(value: ArchitectureOptimizer) -> Self {
        value.name().to_string()
    }
}
