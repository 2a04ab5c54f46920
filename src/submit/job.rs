//! Jobs submitted for a task

use serde::{Deserialize, Serialize};

use crate::cluster::find_architecture;
use crate::error::Result;
use crate::queue::{QueueCommands, ResourceUsage};

/// One job per requested node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJob {
    /// Job name, `<task>.<index>`
    pub job_name: String,
    /// Queue identifier, once the queue shows the job
    pub job_id: Option<u64>,
    /// Whether the job has an exit status
    pub finished: bool,
    /// Running cost estimate in cost-factor units
    pub cost_estimate: f64,
}

impl RemoteJob {
    /// A just-submitted job with its identifier still pending
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            job_id: None,
            finished: false,
            cost_estimate: 0.0,
        }
    }

    /// Whether the identifier is still unknown
    pub fn is_pending(&self) -> bool {
        self.job_id.is_none()
    }

    /// Recompute the cost from reported usage. Unknown models leave the
    /// estimate unchanged.
    pub fn update_cost(&mut self, usage: &ResourceUsage) {
        match find_architecture(&usage.model) {
            Some(arch) => {
                self.cost_estimate = arch.cost_factor * f64::from(usage.nodes) * usage.wall_hours;
            }
            None => tracing::warn!(
                "Job {}: unknown model '{}', cost not updated",
                self.job_name,
                usage.model
            ),
        }
    }

    /// Refresh cost and finished flag from the queue
    pub fn refresh(&mut self, commands: &dyn QueueCommands) -> Result<()> {
        let Some(id) = self.job_id else {
            return Ok(());
        };
        if self.finished {
            return Ok(());
        }
        if let Some(usage) = commands.resource_usage(id)? {
            self.update_cost(&usage);
        }
        if commands.exit_status(id)?.is_some() {
            tracing::info!("Job {} ({}) finished", id, self.job_name);
            self.finished = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::testing::FakeQueue;

    #[test]
    fn test_update_cost() {
        let mut job = RemoteJob::new("100-200-tps.0");
        job.update_cost(&ResourceUsage {
            nodes: 2,
            model: "has".to_string(),
            wall_hours: 2.5,
        });
        assert!((job.cost_estimate - 0.80 * 2.0 * 2.5).abs() < 1e-9);

        job.update_cost(&ResourceUsage {
            nodes: 2,
            model: "zzz".to_string(),
            wall_hours: 9.0,
        });
        assert!((job.cost_estimate - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_marks_finished() {
        let queue = FakeQueue::new("user", "host1").with_long_form(
            42,
            &[
                "Job Id: 42.server",
                "    Resource_List.select = 1:model=bro",
                "    resources_used.walltime = 03:00:00",
                "    Exit_status = 0",
            ],
        );

        let mut pending = RemoteJob::new("t.0");
        pending.refresh(&queue).unwrap();
        assert!(pending.is_pending());
        assert!(!pending.finished);

        let mut job = RemoteJob {
            job_id: Some(42),
            ..RemoteJob::new("t.1")
        };
        job.refresh(&queue).unwrap();
        assert!(job.finished);
        assert!((job.cost_estimate - 3.0).abs() < 1e-9);
    }
}
