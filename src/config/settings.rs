//! Command-line arguments for the `batchplan` binary

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cluster::{RemoteCluster, CLUSTER_ENV_VAR};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "BATCHPLAN_CONFIG";

/// BatchPlan - resource planning and job tracking for HPC clusters
#[derive(Parser, Debug, Clone)]
#[command(name = "batchplan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Plan, submit and track batch jobs on PBS and cloud clusters")]
#[command(long_about = r#"
BatchPlan turns a task's resource needs into a concrete cluster request and
tracks the jobs submitted for it.

Examples:
  batchplan plan --request request.json --subtasks 500
  batchplan catalog --cluster aws
  batchplan status --task 100-200-tps
  batchplan cancel --task 100-200-tps
"#)]
pub struct CliArgs {
    /// Configuration file (JSON)
    #[arg(long, env = CONFIG_ENV_VAR, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Cluster to target instead of detecting it
    #[arg(long, env = CLUSTER_ENV_VAR, value_enum, global = true)]
    pub cluster: Option<ClusterArg>,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output_format: OutputFormat,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compute a resource plan for a request
    #[command(name = "plan")]
    Plan {
        /// Resource request file (JSON)
        #[arg(short, long, value_name = "PATH")]
        request: PathBuf,
        /// Total subtasks in the task
        #[arg(short, long, value_name = "NUM")]
        subtasks: u32,
    },

    /// List architectures and queues of the cluster
    #[command(name = "catalog")]
    Catalog,

    /// Show the jobs of a task and whether they are finished
    #[command(name = "status")]
    Status {
        /// Task name (job name prefix)
        #[arg(short, long)]
        task: String,
    },

    /// Delete every job of a task
    #[command(name = "cancel")]
    Cancel {
        /// Task name (job name prefix)
        #[arg(short, long)]
        task: String,
    },
}

/// Cluster choice on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterArg {
    /// NASA Advanced Supercomputing PBS cluster
    Nas,
    /// AWS elastic cluster
    Aws,
}

impl From<ClusterArg> for RemoteCluster {
    fn from(arg: ClusterArg) -> Self {
        match arg {
            ClusterArg::Nas => RemoteCluster::Nas,
            ClusterArg::Aws => RemoteCluster::Aws,
        }
    }
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}
