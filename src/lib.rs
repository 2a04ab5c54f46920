//! # BatchPlan - Resource Planning and Job Tracking for HPC Clusters
//!
//! BatchPlan splits a pipeline task into jobs on a shared cluster (NAS-style
//! PBS or an AWS elastic cluster) and keeps track of them afterwards.
//!
//! ## Features
//!
//! - **Resource Planning**: architecture, node count, cores per node, wall
//!   time, queue and cost from a task's per-subtask needs
//! - **Architecture Optimizers**: cost, idle cores, queue depth or queue time
//! - **Job Submission**: one `qsub` per node with recoverable job names
//! - **Reconciliation**: matches queued jobs back to tasks across restarts
//! - **Log Scraping**: exit status and comments from PBS logs, plus
//!   timestamp markers for phase durations
//!
//! ## Planning
//!
//! ```no_run
//! use batchplan::cluster::RemoteCluster;
//! use batchplan::planner::{ResourcePlanner, ResourceRequest};
//!
//! let planner = ResourcePlanner::new("s1234");
//! let request = ResourceRequest::new(4.0, 1.0, 4.0);
//! let plan = planner.plan(&request, 500, RemoteCluster::Nas).unwrap();
//!
//! println!("{} x {} nodes for {}", plan.node_count, plan.architecture, plan.wall_time);
//! ```
//!
//! ## Submitting and Monitoring
//!
//! ```no_run
//! use batchplan::config::RemoteConfig;
//! use batchplan::monitor::JobMonitor;
//! use batchplan::process::SystemProcessRunner;
//! use batchplan::queue::queue_commands;
//! use batchplan::submit::{JobSubmitter, SubmissionRequest, TaskIdentity};
//! # use batchplan::planner::ResourcePlan;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn plan() -> ResourcePlan { unimplemented!() }
//! let config = RemoteConfig::default();
//! let runner = Arc::new(SystemProcessRunner::new());
//! let mut task = TaskIdentity::new(100, 200, "tps");
//!
//! let params = SubmissionRequest::from_plan(&plan(), &config, &task, Path::new("/work/task"))
//!     .build()
//!     .unwrap();
//! let report = JobSubmitter::from_config(&config, runner.clone()).submit(&params, &mut task);
//!
//! let mut monitor = JobMonitor::new(queue_commands(&config, runner));
//! monitor.add_to_monitoring(&task.base_name());
//! monitor.update();
//! let mut jobs = report.jobs;
//! monitor.assign_job_ids(&task.base_name(), &mut jobs);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod logs;
pub mod monitor;
pub mod planner;
pub mod process;
pub mod queue;
pub mod submit;

// Re-export commonly used types
pub use cluster::{ClusterContext, RemoteCluster};
pub use error::{BatchPlanError, Result};
pub use planner::{ResourcePlan, ResourcePlanner, ResourceRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use batchplan::prelude::*;
    //! ```

    pub use crate::cluster::{ClusterContext, NodeArchitecture, QueueDescriptor, RemoteCluster};
    pub use crate::config::{RemoteConfig, ResourceOverrides};
    pub use crate::error::{BatchPlanError, Result};
    pub use crate::logs::{PhaseDurations, TimestampEvent};
    pub use crate::monitor::{JobMonitor, TaskState};
    pub use crate::planner::{
        ArchitectureOptimizer, QueueMetrics, ResourcePlan, ResourcePlanner, ResourceRequest,
    };
    pub use crate::process::{CommandLine, ProcessRunner, SystemProcessRunner};
    pub use crate::queue::{queue_commands, QueueCommands, QueueEntry};
    pub use crate::submit::{JobSubmitter, RemoteJob, SubmissionRequest, TaskIdentity};
}
