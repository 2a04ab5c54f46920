//! Task identity and the names derived from it

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the pipeline task whose jobs are being submitted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentity {
    /// Pipeline instance
    pub instance_id: u64,
    /// Pipeline task
    pub task_id: u64,
    /// Module the task runs
    pub module_name: String,
    /// Bumped once per submission batch so each batch gets fresh log files
    pub log_index: u32,
}

impl TaskIdentity {
    /// New identity with log index 0
    pub fn new(instance_id: u64, task_id: u64, module_name: impl Into<String>) -> Self {
        Self {
            instance_id,
            task_id,
            module_name: module_name.into(),
            log_index: 0,
        }
    }

    /// `<instance>-<task>-<module>`; also the task name the monitor tracks
    pub fn base_name(&self) -> String {
        format!("{}-{}-{}", self.instance_id, self.task_id, self.module_name)
    }

    /// Name of the job for node `job_index`
    pub fn job_name(&self, job_index: u32) -> String {
        format!("{}.{}", self.base_name(), job_index)
    }

    /// State file name for the task
    pub fn state_filename(&self) -> String {
        format!("{}.state", self.base_name())
    }

    /// Algorithm log file name for node `job_index` in the current batch
    pub fn log_filename(&self, job_index: u32) -> String {
        format!("{}.{}-{}.log", self.base_name(), job_index, self.log_index)
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name())
    }
}
