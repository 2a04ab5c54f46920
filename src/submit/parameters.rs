//! Validated job submission parameters

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::TaskIdentity;
use crate::cluster::RemoteCluster;
use crate::config::RemoteConfig;
use crate::error::{BatchPlanError, Result};
use crate::planner::ResourcePlan;

/// Submission fields as gathered from a plan and configuration. Anything may
/// still be missing; [`SubmissionRequest::build`] checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionRequest {
    /// Target cluster
    pub cluster: Option<RemoteCluster>,
    /// Queue name
    pub queue_name: Option<String>,
    /// Wall time, `HH:MM:SS`
    pub wall_time: Option<String>,
    /// Jobs to submit, one per node
    pub node_count: Option<u32>,
    /// Cores per node (cloud only)
    pub cores_per_node: Option<u32>,
    /// RAM per node, GB (cloud only)
    pub gigs_per_node: Option<f64>,
    /// Architecture model
    pub model: Option<String>,
    /// Billing group
    pub group: Option<String>,
    /// Job wrapper script
    pub script_path: Option<PathBuf>,
    /// Task working directory the job processes
    pub working_dir: Option<PathBuf>,
    /// Home directory of the installation
    pub home_dir: Option<PathBuf>,
    /// Task state file
    pub state_file: Option<PathBuf>,
    /// Configuration file read by the job
    pub config_path: Option<PathBuf>,
    /// Directory for PBS output logs
    pub pbs_log_dir: Option<PathBuf>,
    /// Directory for algorithm logs
    pub algorithm_log_dir: Option<PathBuf>,
    /// Variables exported to the job
    pub environment: BTreeMap<String, String>,
}

impl SubmissionRequest {
    /// Gather fields from a plan, the remote configuration and the task
    /// being submitted
    pub fn from_plan(
        plan: &ResourcePlan,
        config: &RemoteConfig,
        task: &TaskIdentity,
        working_dir: &Path,
    ) -> Self {
        Self {
            cluster: Some(plan.cluster),
            queue_name: Some(plan.queue_name.clone()),
            wall_time: Some(plan.wall_time.clone()),
            node_count: Some(plan.node_count),
            cores_per_node: Some(plan.min_cores_per_node),
            gigs_per_node: Some(plan.min_gigs_per_node),
            model: Some(plan.architecture.clone()),
            group: Some(plan.group.clone()).filter(|g| !g.is_empty()),
            script_path: config.script_path.clone(),
            working_dir: Some(working_dir.to_path_buf()),
            home_dir: config.home_dir.clone(),
            state_file: config
                .state_dir
                .as_ref()
                .map(|dir| dir.join(task.state_filename())),
            config_path: config.config_path.clone(),
            pbs_log_dir: config.pbs_log_dir.clone(),
            algorithm_log_dir: config.algorithm_log_dir.clone(),
            environment: config.environment.clone(),
        }
    }

    /// Validate every required field at once
    pub fn build(self) -> Result<SubmissionParameters> {
        let mut missing = Vec::new();
        let cluster = require(self.cluster, "cluster", &mut missing);
        let queue_name = require(self.queue_name, "queue_name", &mut missing);
        let wall_time = require(self.wall_time, "wall_time", &mut missing);
        let node_count = require(self.node_count, "node_count", &mut missing);
        let model = require(self.model, "model", &mut missing);
        let group = require(self.group, "group", &mut missing);
        let script_path = require(self.script_path, "script_path", &mut missing);
        let working_dir = require(self.working_dir, "working_dir", &mut missing);
        let home_dir = require(self.home_dir, "home_dir", &mut missing);
        let state_file = require(self.state_file, "state_file", &mut missing);
        let config_path = require(self.config_path, "config_path", &mut missing);
        let pbs_log_dir = require(self.pbs_log_dir, "pbs_log_dir", &mut missing);
        let algorithm_log_dir = require(self.algorithm_log_dir, "algorithm_log_dir", &mut missing);

        if cluster == Some(RemoteCluster::Aws) {
            if self.cores_per_node.is_none() {
                missing.push("cores_per_node");
            }
            if self.gigs_per_node.is_none() {
                missing.push("gigs_per_node");
            }
        }

        match (
            cluster,
            queue_name,
            wall_time,
            node_count,
            model,
            group,
            script_path,
            working_dir,
            home_dir,
            state_file,
            config_path,
            pbs_log_dir,
            algorithm_log_dir,
        ) {
            (
                Some(cluster),
                Some(queue_name),
                Some(wall_time),
                Some(node_count),
                Some(model),
                Some(group),
                Some(script_path),
                Some(working_dir),
                Some(home_dir),
                Some(state_file),
                Some(config_path),
                Some(pbs_log_dir),
                Some(algorithm_log_dir),
            ) if missing.is_empty() => Ok(SubmissionParameters {
                cluster,
                queue_name,
                wall_time,
                node_count,
                cores_per_node: self.cores_per_node,
                gigs_per_node: self.gigs_per_node,
                model,
                group,
                script_path,
                working_dir,
                home_dir,
                state_file,
                config_path,
                pbs_log_dir,
                algorithm_log_dir,
                environment: self.environment,
            }),
            _ => {
                tracing::error!("Submission missing required fields: [{}]", missing.join(","));
                Err(BatchPlanError::MissingSubmissionFields(missing))
            }
        }
    }
}

fn require<T>(value: Option<T>, name: &'static str, missing: &mut Vec<&'static str>) -> Option<T> {
    if value.is_none() {
        missing.push(name);
    }
    value
}

/// Everything needed to submit a task's jobs. Reusable across batches; each
/// submission stamps its own PBS log names.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionParameters {
    /// Target cluster
    pub cluster: RemoteCluster,
    /// Queue name
    pub queue_name: String,
    /// Wall time, `HH:MM:SS`
    pub wall_time: String,
    /// Jobs to submit
    pub node_count: u32,
    /// Cores per node; always set for cloud clusters
    pub cores_per_node: Option<u32>,
    /// RAM per node; always set for cloud clusters
    pub gigs_per_node: Option<f64>,
    /// Architecture model
    pub model: String,
    /// Billing group
    pub group: String,
    /// Job wrapper script
    pub script_path: PathBuf,
    /// Task working directory
    pub working_dir: PathBuf,
    /// Home directory of the installation
    pub home_dir: PathBuf,
    /// Task state file
    pub state_file: PathBuf,
    /// Configuration file read by the job
    pub config_path: PathBuf,
    /// Directory for PBS output logs
    pub pbs_log_dir: PathBuf,
    /// Directory for algorithm logs
    pub algorithm_log_dir: PathBuf,
    /// Variables exported to the job
    pub environment: BTreeMap<String, String>,
}

impl SubmissionParameters {
    /// PBS `-l` resource list for a job covering `nodes` nodes
    pub fn resource_options(&self, nodes: u32) -> String {
        match (self.cluster, self.cores_per_node, self.gigs_per_node) {
            (RemoteCluster::Aws, Some(cores), Some(gigs)) => format!(
                "walltime={},select={}:arch={}:ncpus={}:mem={}g",
                self.wall_time, nodes, self.model, cores, gigs
            ),
            _ => format!(
                "walltime={},select={}:model={}",
                self.wall_time, nodes, self.model
            ),
        }
    }

    /// Positional script arguments ahead of the algorithm log path
    pub fn script_arguments(&self) -> [&Path; 4] {
        [
            self.working_dir.as_path(),
            self.home_dir.as_path(),
            self.state_file.as_path(),
            self.config_path.as_path(),
        ]
    }

    /// `qsub -v` value, or `None` when there is nothing to export
    pub fn environment_option(&self) -> Option<String> {
        if self.environment.is_empty() {
            return None;
        }
        Some(
            self.environment
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}
