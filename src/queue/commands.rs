//! Queue inspection and deletion commands

use std::collections::BTreeMap;
use std::sync::Arc;

use super::protocol::{
    parse_exit_comment, parse_exit_status, parse_job_information, parse_job_servers,
    parse_queue_entries, parse_resource_usage, JobInformation, JobServer, QueueEntry,
    ResourceUsage,
};
use crate::error::Result;

/// Access to the cluster's queue. Implementations supply the raw `qstat`
/// and `qdel` calls; the typed queries are built on top.
pub trait QueueCommands: Send {
    /// Run `qstat` with `args` and return its stdout lines
    fn qstat(&self, args: &[String]) -> Result<Vec<String>>;

    /// Delete jobs by identifier; fire and forget
    fn qdel(&self, ids: &[u64]) -> Result<()>;

    /// User whose jobs this monitor owns
    fn owner(&self) -> &str;

    /// Short name of the host jobs are submitted from
    fn host(&self) -> &str;

    /// Fire-and-forget deletion; an empty id set issues no command
    fn delete_jobs(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        tracing::info!("Deleting {} jobs", ids.len());
        self.qdel(ids)
    }

    /// `qstat` output keeping only lines that contain one of `targets`
    fn qstat_matching(&self, args: &[String], targets: &[&str]) -> Result<Vec<String>> {
        let lines = self.qstat(args)?;
        if targets.is_empty() {
            return Ok(lines);
        }
        Ok(lines
            .into_iter()
            .filter(|line| targets.iter().any(|t| line.contains(t)))
            .collect())
    }

    /// Owner's queue entries whose job name belongs to `task`
    fn entries_for_task(&self, task: &str) -> Result<Vec<QueueEntry>> {
        let args = vec!["-u".to_string(), self.owner().to_string()];
        let lines = self.qstat_matching(&args, &[task])?;
        let prefix = format!("{}.", task);
        Ok(parse_queue_entries(&lines)
            .into_iter()
            .filter(|e| e.name == task || e.name.starts_with(&prefix))
            .collect())
    }

    /// Current entries for specific job identifiers, including finished jobs
    fn entries_by_id(&self, ids: &[u64]) -> Result<Vec<QueueEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["-x".to_string()];
        args.extend(ids.iter().map(u64::to_string));
        Ok(parse_queue_entries(&self.qstat(&args)?))
    }

    /// Owner and submitting host of each job
    fn job_servers(&self, ids: &[u64]) -> Result<BTreeMap<u64, JobServer>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut args = vec!["-xf".to_string()];
        args.extend(ids.iter().map(u64::to_string));
        let lines = self.qstat_matching(&args, &["Job:", "Job Id:", "Job_Owner"])?;
        Ok(parse_job_servers(&lines).into_iter().collect())
    }

    /// Exit status of a job; `None` while it is still running
    fn exit_status(&self, id: u64) -> Result<Option<i32>> {
        let lines = self.qstat_matching(&long_form(id), &["Exit_status"])?;
        Ok(parse_exit_status(&lines))
    }

    /// Scheduler comment for a job
    fn exit_comment(&self, id: u64) -> Result<Option<String>> {
        let lines = self.qstat_matching(&long_form(id), &["comment"])?;
        Ok(parse_exit_comment(&lines))
    }

    /// Selected resources and consumed wall time of a job
    fn resource_usage(&self, id: u64) -> Result<Option<ResourceUsage>> {
        let lines =
            self.qstat_matching(&long_form(id), &["Resource_List.select", "resources_used.walltime"])?;
        Ok(parse_resource_usage(&lines))
    }

    /// Name and output log path of a job
    fn job_information(&self, id: u64) -> Result<Option<JobInformation>> {
        let lines = self.qstat_matching(&long_form(id), &["Job_Name", "Output_Path"])?;
        Ok(parse_job_information(&lines))
    }
}

fn long_form(id: u64) -> Vec<String> {
    vec!["-xf".to_string(), id.to_string()]
}

impl<C: QueueCommands + ?Sized> QueueCommands for Box<C> {
    fn qstat(&self, args: &[String]) -> Result<Vec<String>> {
        (**self).qstat(args)
    }

    fn qdel(&self, ids: &[u64]) -> Result<()> {
        (**self).qdel(ids)
    }

    fn owner(&self) -> &str {
        (**self).owner()
    }

    fn host(&self) -> &str {
        (**self).host()
    }
}

impl<C: QueueCommands + Sync + ?Sized> QueueCommands for Arc<C> {
    fn qstat(&self, args: &[String]) -> Result<Vec<String>> {
        (**self).qstat(args)
    }

    fn qdel(&self, ids: &[u64]) -> Result<()> {
        (**self).qdel(ids)
    }

    fn owner(&self) -> &str {
        (**self).owner()
    }

    fn host(&self) -> &str {
        (**self).host()
    }
}
