//! Job submission with `qsub`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{RemoteJob, SubmissionParameters, TaskIdentity};
use crate::config::RemoteConfig;
use crate::process::{CommandLine, ProcessRunner};

/// Default `qsub` timeout
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code recorded when `qsub` could not be run at all
pub const NOT_RUN_EXIT_CODE: i32 = -1;

/// Local-time stamp in PBS log names, one per batch
const DATESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Outcome of one submission batch
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    /// `qsub` exit code per job index
    pub exit_codes: Vec<i32>,
    /// Jobs the batch system accepted, identifiers pending
    pub jobs: Vec<RemoteJob>,
}

impl SubmissionReport {
    /// Jobs attempted
    pub fn submitted(&self) -> usize {
        self.exit_codes.len()
    }

    /// Jobs accepted
    pub fn accepted(&self) -> usize {
        self.jobs.len()
    }

    /// Whether every job was accepted
    pub fn all_accepted(&self) -> bool {
        self.submitted() == self.accepted()
    }
}

/// Submits one job per planned node
pub struct JobSubmitter {
    runner: Arc<dyn ProcessRunner>,
    qsub_path: String,
    timeout: Duration,
}

impl JobSubmitter {
    /// Create a submitter using `/PBS/bin/qsub`
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            qsub_path: "/PBS/bin/qsub".to_string(),
            timeout: SUBMIT_TIMEOUT,
        }
    }

    /// Create a submitter with the configured `qsub` path and timeout
    pub fn from_config(config: &RemoteConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            qsub_path: config.qsub_path.clone(),
            timeout: config.submit_timeout(),
        }
    }

    /// Submit every job of a batch. Rejected jobs do not stop the rest; they
    /// show up as nonzero exit codes and are missing from the returned jobs.
    pub fn submit(&self, params: &SubmissionParameters, task: &mut TaskIdentity) -> SubmissionReport {
        task.log_index += 1;
        let datestamp = chrono::Local::now().format(DATESTAMP_FORMAT).to_string();

        let mut report = SubmissionReport {
            exit_codes: Vec::with_capacity(params.node_count as usize),
            jobs: Vec::new(),
        };
        for job_index in 0..params.node_count {
            let command = self.command_line(params, task, job_index, &datestamp);
            tracing::info!("Running PBS command: {}", command);
            let exit_code = match self.runner.run(&command, self.timeout) {
                Ok(output) => {
                    if !output.success() {
                        tracing::warn!(
                            "qsub for {} exited with {}: {}",
                            task.job_name(job_index),
                            output.exit_code,
                            output.stderr.join(" ")
                        );
                    }
                    output.exit_code
                }
                Err(e) => {
                    tracing::warn!("qsub for {} failed: {}", task.job_name(job_index), e);
                    NOT_RUN_EXIT_CODE
                }
            };
            if exit_code == 0 {
                report.jobs.push(RemoteJob::new(task.job_name(job_index)));
            }
            report.exit_codes.push(exit_code);
        }

        if !report.all_accepted() {
            tracing::error!(
                "{} jobs submitted, only {} accepted",
                report.submitted(),
                report.accepted()
            );
        }
        report
    }

    /// The `qsub` command line for one job of the batch stamped `datestamp`
    pub fn command_line(
        &self,
        params: &SubmissionParameters,
        task: &TaskIdentity,
        job_index: u32,
        datestamp: &str,
    ) -> CommandLine {
        let job_name = task.job_name(job_index);
        let pbs_log = params
            .pbs_log_dir
            .join(format!("pbs-{}-{}", job_name, datestamp));
        let algorithm_log = params.algorithm_log_dir.join(task.log_filename(job_index));

        let mut command = CommandLine::new(&self.qsub_path)
            .arg("-N")
            .arg(job_name)
            .arg("-q")
            .arg(&params.queue_name)
            .arg("-rn")
            .arg("-l")
            .arg(params.resource_options(1))
            .arg("-W")
            .arg(format!("group_list={}", params.group));
        if let Some(environment) = params.environment_option() {
            command = command.arg("-v").arg(environment);
        }
        command
            .arg("-o")
            .arg(path_arg(&pbs_log))
            .arg("-j")
            .arg("oe")
            .arg("--")
            .arg(path_arg(&params.script_path))
            .args(params.script_arguments().into_iter().map(path_arg))
            .arg(path_arg(&algorithm_log))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
