//! PBS queue commands run locally or over ssh

use std::sync::Arc;
use std::time::Duration;

use super::protocol::short_host;
use super::QueueCommands;
use crate::config::{QueueCommandMode, RemoteConfig};
use crate::error::{BatchPlanError, Result};
use crate::process::{CommandLine, ProcessRunner};

/// Paths and limits shared by both command flavours
#[derive(Clone)]
struct PbsCommands {
    runner: Arc<dyn ProcessRunner>,
    qstat_path: String,
    qdel_path: String,
    timeout: Duration,
    owner: String,
    host: String,
}

impl PbsCommands {
    fn from_config(config: &RemoteConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            qstat_path: config.qstat_path.clone(),
            qdel_path: config.qdel_path.clone(),
            timeout: Duration::from_secs(config.query_timeout_secs),
            owner: config.owner.clone(),
            host: short_host(&config.host).to_string(),
        }
    }

    fn run(&self, command: CommandLine) -> Result<Vec<String>> {
        let output = self.runner.run(&command, self.timeout)?;
        // qstat exits nonzero when some of the requested ids are unknown
        // but still prints the rest
        if !output.success() && output.stdout.is_empty() {
            return Err(BatchPlanError::queue_command(
                command.to_string(),
                format!("exit code {}: {}", output.exit_code, output.stderr.join(" ")),
            ));
        }
        Ok(output.stdout)
    }

    fn qstat_command(&self, args: &[String]) -> CommandLine {
        CommandLine::new(&self.qstat_path).args(args.iter().cloned())
    }

    fn qdel_command(&self, ids: &[u64]) -> CommandLine {
        CommandLine::new(&self.qdel_path).args(ids.iter().map(u64::to_string))
    }
}

/// Runs `qstat`/`qdel` on this machine
pub struct LocalQueueCommands {
    inner: PbsCommands,
}

impl LocalQueueCommands {
    /// Create from configuration
    pub fn new(config: &RemoteConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            inner: PbsCommands::from_config(config, runner),
        }
    }
}

impl QueueCommands for LocalQueueCommands {
    fn qstat(&self, args: &[String]) -> Result<Vec<String>> {
        self.inner.run(self.inner.qstat_command(args))
    }

    fn qdel(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.inner.run(self.inner.qdel_command(ids)).map(|_| ())
    }

    fn owner(&self) -> &str {
        &self.inner.owner
    }

    fn host(&self) -> &str {
        &self.inner.host
    }
}

/// Runs `qstat`/`qdel` on a cluster front end over ssh
pub struct RemoteQueueCommands {
    inner: PbsCommands,
    remote_host: String,
}

impl RemoteQueueCommands {
    /// Create from configuration, targeting `remote_host`
    pub fn new(config: &RemoteConfig, runner: Arc<dyn ProcessRunner>, remote_host: &str) -> Self {
        Self {
            inner: PbsCommands::from_config(config, runner),
            remote_host: remote_host.to_string(),
        }
    }
}

impl QueueCommands for RemoteQueueCommands {
    fn qstat(&self, args: &[String]) -> Result<Vec<String>> {
        self.inner
            .run(self.inner.qstat_command(args).over_ssh(&self.remote_host))
    }

    fn qdel(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.inner
            .run(self.inner.qdel_command(ids).over_ssh(&self.remote_host))
            .map(|_| ())
    }

    fn owner(&self) -> &str {
        &self.inner.owner
    }

    fn host(&self) -> &str {
        &self.inner.host
    }
}

/// Build the queue command flavour named by the configuration
pub fn queue_commands(
    config: &RemoteConfig,
    runner: Arc<dyn ProcessRunner>,
) -> Box<dyn QueueCommands> {
    match &config.queue_command_mode {
        QueueCommandMode::Local => Box::new(LocalQueueCommands::new(config, runner)),
        QueueCommandMode::Remote { host } => {
            Box::new(RemoteQueueCommands::new(config, runner, host))
        }
    }
}
