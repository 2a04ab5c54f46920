//! Job reconciliation
//!
//! [`JobMonitor`] tracks task name -> jobs by polling the queue. A task with
//! no jobs yet is matched by job name, filtered to this monitor's owner and
//! host, keeping the newest job for each name. A task with jobs is refreshed
//! by job identifier. Queue failures are logged and the state kept, so the
//! next poll can recover.
//!
//! The monitor is single-threaded: callers serialize `update()`.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::queue::{QueueCommands, QueueEntry};
use crate::submit::RemoteJob;

/// Whether a tracked task has been matched to jobs yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// No jobs matched
    Unassigned,
    /// At least one job matched
    Assigned,
}

/// Tracks the queue state of submitted tasks
pub struct JobMonitor {
    commands: Box<dyn QueueCommands>,
    tasks: BTreeMap<String, BTreeMap<u64, QueueEntry>>,
}

impl JobMonitor {
    /// Create a monitor over `commands`
    pub fn new(commands: Box<dyn QueueCommands>) -> Self {
        Self {
            commands,
            tasks: BTreeMap::new(),
        }
    }

    /// Queue commands in use
    pub fn commands(&self) -> &dyn QueueCommands {
        self.commands.as_ref()
    }

    /// Start tracking `task`; a task already tracked keeps its jobs
    pub fn add_to_monitoring(&mut self, task: &str) {
        self.tasks.entry(task.to_string()).or_default();
    }

    /// Stop tracking `task`
    pub fn end_monitoring(&mut self, task: &str) {
        self.tasks.remove(task);
    }

    /// Names of tracked tasks
    pub fn tasks_in_monitor(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Assignment state of `task`, `None` when not tracked
    pub fn state(&self, task: &str) -> Option<TaskState> {
        self.tasks.get(task).map(|jobs| {
            if jobs.is_empty() {
                TaskState::Unassigned
            } else {
                TaskState::Assigned
            }
        })
    }

    /// Jobs currently assigned to `task`
    pub fn jobs(&self, task: &str) -> Vec<&QueueEntry> {
        self.tasks
            .get(task)
            .map(|jobs| jobs.values().collect())
            .unwrap_or_default()
    }

    /// Identifiers of the jobs assigned to `task`
    pub fn job_ids(&self, task: &str) -> Vec<u64> {
        self.tasks
            .get(task)
            .map(|jobs| jobs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// True only when `task` has jobs and every one of them is finished
    pub fn is_finished(&self, task: &str) -> bool {
        match self.tasks.get(task) {
            Some(jobs) if !jobs.is_empty() => jobs.values().all(QueueEntry::is_finished),
            _ => false,
        }
    }

    /// Poll the queue once. Never fails; queue errors leave state unchanged.
    pub fn update(&mut self) {
        if let Err(e) = self.refresh_assigned() {
            tracing::warn!("Queue refresh failed, keeping previous state: {}", e);
        }
        let unassigned: Vec<String> = self
            .tasks
            .iter()
            .filter(|(_, jobs)| jobs.is_empty())
            .map(|(task, _)| task.clone())
            .collect();
        for task in unassigned {
            match self.match_task(&task) {
                Ok(jobs) if !jobs.is_empty() => {
                    tracing::info!(
                        "Task {} matched to jobs {:?}",
                        task,
                        jobs.keys().collect::<Vec<_>>()
                    );
                    self.tasks.insert(task, jobs);
                }
                Ok(_) => tracing::debug!("No queued jobs for task {} yet", task),
                Err(e) => tracing::warn!("Queue query for task {} failed: {}", task, e),
            }
        }
    }

    /// One batched query for every assigned job
    fn refresh_assigned(&mut self) -> Result<()> {
        let ids: Vec<u64> = self
            .tasks
            .values()
            .flat_map(|jobs| jobs.keys().copied())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        let latest: HashMap<u64, QueueEntry> = self
            .commands
            .entries_by_id(&ids)?
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect();
        for jobs in self.tasks.values_mut() {
            for (id, entry) in jobs.iter_mut() {
                if let Some(fresh) = latest.get(id) {
                    entry.status = fresh.status.clone();
                    entry.name = fresh.name.clone();
                }
            }
        }
        Ok(())
    }

    /// Newest job per name among this owner's and host's jobs for `task`
    fn match_task(&self, task: &str) -> Result<BTreeMap<u64, QueueEntry>> {
        let owner = self.commands.owner();
        let entries: Vec<QueueEntry> = self
            .commands
            .entries_for_task(task)?
            .into_iter()
            .filter(|e| e.owner == owner)
            .collect();
        if entries.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
        let servers = self.commands.job_servers(&ids)?;
        let host = self.commands.host();

        let mut newest: BTreeMap<String, QueueEntry> = BTreeMap::new();
        for mut entry in entries {
            let Some(server) = servers.get(&entry.id) else {
                continue;
            };
            if server.owner != owner || server.host != host {
                continue;
            }
            entry.host = Some(server.host.clone());
            match newest.get(&entry.name) {
                Some(kept) if kept.id >= entry.id => {}
                _ => {
                    newest.insert(entry.name.clone(), entry);
                }
            }
        }
        Ok(newest.into_values().map(|e| (e.id, e)).collect())
    }

    /// Exit status of each finished job of `task`; running jobs are left out
    pub fn exit_status(&self, task: &str) -> Result<BTreeMap<u64, i32>> {
        let mut statuses = BTreeMap::new();
        for id in self.job_ids(task) {
            if let Some(status) = self.commands.exit_status(id)? {
                statuses.insert(id, status);
            }
        }
        Ok(statuses)
    }

    /// Scheduler comment of each job of `task` that has one
    pub fn exit_comment(&self, task: &str) -> Result<BTreeMap<u64, String>> {
        let mut comments = BTreeMap::new();
        for id in self.job_ids(task) {
            if let Some(comment) = self.commands.exit_comment(id)? {
                comments.insert(id, comment);
            }
        }
        Ok(comments)
    }

    /// Delete every job of `task` without waiting for the queue to confirm
    pub fn delete_task_jobs(&self, task: &str) -> Result<()> {
        self.commands.delete_jobs(&self.job_ids(task))
    }

    /// Fill in pending identifiers of `jobs` from the jobs matched to `task`.
    /// Returns how many were filled in.
    pub fn assign_job_ids(&self, task: &str, jobs: &mut [RemoteJob]) -> usize {
        let Some(entries) = self.tasks.get(task) else {
            return 0;
        };
        let by_name: HashMap<&str, u64> = entries
            .values()
            .map(|e| (e.name.as_str(), e.id))
            .collect();
        let mut assigned = 0;
        for job in jobs.iter_mut().filter(|j| j.is_pending()) {
            if let Some(&id) = by_name.get(job.job_name.as_str()) {
                job.job_id = Some(id);
                assigned += 1;
            }
        }
        assigned
    }

    /// After a restart, track again every task that still has unfinished
    /// jobs. Returns whether anything was resumed.
    pub fn resume<'a, I>(&mut self, tasks: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a [RemoteJob])>,
    {
        let mut resumed = false;
        for (task, jobs) in tasks {
            if jobs.iter().any(|j| !j.finished) {
                tracing::info!("Resuming monitoring of task {}", task);
                self.add_to_monitoring(task);
                resumed = true;
            }
        }
        resumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::testing::FakeQueue;
    use std::sync::Arc;

    const TASK: &str = "100-200-tps";

    fn line(id: u64, name: &str, status: &str) -> String {
        line_owned_by("user", id, name, status)
    }

    fn line_owned_by(owner: &str, id: u64, name: &str, status: &str) -> String {
        format!("{}.batch {} low    {}    5   5 04:00 {} 02:33  254%", id, owner, name, status)
    }

    fn owner_dump(entries: &[(u64, &str)]) -> Vec<String> {
        entries
            .iter()
            .flat_map(|(id, host)| {
                [
                    format!("Job: {}.batch", id),
                    format!("    Job_Owner = user@{}.example.com", host),
                ]
            })
            .collect()
    }

    fn relist(queue: &FakeQueue, listing: &[String]) {
        let lines: Vec<&str> = listing.iter().map(String::as_str).collect();
        queue.set_listing(&lines);
    }

    fn queue_with(listing: &[String], owners: &[(u64, &str)]) -> Arc<FakeQueue> {
        let queue = FakeQueue::new("user", "host1");
        relist(&queue, listing);
        for (id, host) in owners {
            let dump = owner_dump(&[(*id, host)]);
            let dump: Vec<&str> = dump.iter().map(String::as_str).collect();
            queue.set_long_form(*id, &dump);
        }
        Arc::new(queue)
    }

    fn monitor(queue: &Arc<FakeQueue>) -> JobMonitor {
        JobMonitor::new(Box::new(queue.clone()))
    }

    #[test]
    fn test_unassigned_task_is_not_finished() {
        let queue = queue_with(&[], &[]);
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring(TASK);
        monitor.update();

        assert_eq!(monitor.state(TASK), Some(TaskState::Unassigned));
        assert!(!monitor.is_finished(TASK));
        assert!(monitor.job_ids(TASK).is_empty());
        assert_eq!(monitor.state("other"), None);
    }

    #[test]
    fn test_assign_and_finish() {
        let queue = queue_with(
            &[line(1234567, "100-200-tps.0", "R"), line(1234568, "100-200-tps.1", "Q")],
            &[(1234567, "host1"), (1234568, "host1")],
        );
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring(TASK);
        monitor.update();

        assert_eq!(monitor.state(TASK), Some(TaskState::Assigned));
        assert_eq!(monitor.job_ids(TASK), vec![1234567, 1234568]);
        assert!(!monitor.is_finished(TASK));

        relist(&queue, &[line(1234567, "100-200-tps.0", "F"), line(1234568, "100-200-tps.1", "R")]);
        monitor.update();
        assert!(!monitor.is_finished(TASK));

        relist(&queue, &[line(1234567, "100-200-tps.0", "F"), line(1234568, "100-200-tps.1", "E")]);
        monitor.update();
        assert!(monitor.is_finished(TASK));
    }

    #[test]
    fn test_refresh_is_batched_by_id() {
        let queue = queue_with(
            &[line(11, "a.0", "R"), line(22, "b.0", "R")],
            &[(11, "host1"), (22, "host1")],
        );
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring("a");
        monitor.add_to_monitoring("b");
        monitor.update();

        let before = queue.queries().len();
        monitor.update();
        let queries = queue.queries();
        assert_eq!(queries.len(), before + 1);
        assert_eq!(queries[before], vec!["-x", "11", "22"]);
    }

    #[test]
    fn test_duplicate_names_keep_newest() {
        let queue = queue_with(
            &[
                line(1234567, "100-200-tps.0", "F"),
                line(1234587, "100-200-tps.0", "F"),
                line(1234597, "100-200-tps.0", "R"),
                line(1234577, "100-200-tps.1", "R"),
            ],
            &[
                (1234567, "host1"),
                (1234587, "host1"),
                (1234597, "host1"),
                (1234577, "host1"),
            ],
        );
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring(TASK);
        monitor.update();
        assert_eq!(monitor.job_ids(TASK), vec![1234577, 1234597]);
    }

    #[test]
    fn test_other_hosts_and_owners_are_ignored() {
        let queue = queue_with(
            &[
                line(1234587, "100-200-tps.0", "R"),
                line(1234597, "100-200-tps.0", "R"),
                line(1234599, "100-200-tps.1", "R"),
            ],
            &[(1234587, "host1"), (1234597, "host2")],
        );
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring(TASK);
        monitor.update();
        // 1234597 is newer but was submitted from another host; 1234599 has
        // no owner information at all
        assert_eq!(monitor.job_ids(TASK), vec![1234587]);
        assert_eq!(monitor.jobs(TASK)[0].host.as_deref(), Some("host1"));
    }

    #[test]
    fn test_jobs_of_other_owners_are_ignored() {
        let queue = queue_with(
            &[
                line(1234587, "100-200-tps.0", "R"),
                line_owned_by("someone", 1234597, "100-200-tps.0", "R"),
                line(1234599, "100-200-tps.1", "R"),
            ],
            &[(1234587, "host1"), (1234597, "host1")],
        );
        // listed under our name, but the server records another owner on
        // the right host
        queue.set_long_form(
            1234599,
            &["Job: 1234599.batch", "    Job_Owner = someone@host1.example.com"],
        );
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring(TASK);
        monitor.update();

        assert_eq!(monitor.job_ids(TASK), vec![1234587]);
        // the job listed under another owner is never looked up
        assert!(!queue
            .queries()
            .iter()
            .any(|q| q.first().map(String::as_str) == Some("-xf")
                && q.iter().any(|a| a == "1234597")));
    }

    #[test]
    fn test_queue_failure_keeps_state() {
        let queue = queue_with(&[line(7, "t.0", "R")], &[(7, "host1")]);
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring("t");
        monitor.add_to_monitoring("u");
        monitor.update();
        assert_eq!(monitor.job_ids("t"), vec![7]);

        queue.set_failing(true);
        monitor.update();
        assert_eq!(monitor.job_ids("t"), vec![7]);
        assert_eq!(monitor.state("u"), Some(TaskState::Unassigned));

        queue.set_failing(false);
        relist(&queue, &[line(7, "t.0", "F")]);
        monitor.update();
        assert!(monitor.is_finished("t"));
    }

    #[test]
    fn test_exit_status_skips_running_jobs() {
        let queue = queue_with(
            &[line(1, "t.0", "F"), line(2, "t.1", "R")],
            &[(1, "host1"), (2, "host1")],
        );
        let mut dump = owner_dump(&[(1, "host1")]);
        dump.push("    comment = Job run at Mon and finished".to_string());
        dump.push("    Exit_status = 271".to_string());
        let dump: Vec<&str> = dump.iter().map(String::as_str).collect();
        queue.set_long_form(1, &dump);

        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring("t");
        monitor.update();

        let statuses = monitor.exit_status("t").unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[&1], 271);
        let comments = monitor.exit_comment("t").unwrap();
        assert_eq!(comments[&1], "Job run at Mon and finished");
    }

    #[test]
    fn test_delete_and_end_monitoring() {
        let queue = queue_with(&[line(5, "t.0", "R")], &[(5, "host1")]);
        let mut monitor = monitor(&queue);
        monitor.add_to_monitoring("t");
        monitor.add_to_monitoring("empty");
        monitor.update();

        monitor.delete_task_jobs("t").unwrap();
        monitor.delete_task_jobs("empty").unwrap();
        assert_eq!(queue.deleted(), vec![5]);

        monitor.end_monitoring("t");
        assert_eq!(monitor.tasks_in_monitor(), vec!["empty"]);
    }

    #[test]
    fn test_assign_job_ids_and_resume() {
        let queue = queue_with(
            &[line(31, "t.0", "R"), line(32, "t.1", "R")],
            &[(31, "host1"), (32, "host1")],
        );
        let mut monitor = monitor(&queue);

        let mut jobs = vec![RemoteJob::new("t.0"), RemoteJob::new("t.1"), RemoteJob::new("t.2")];
        let finished = vec![RemoteJob {
            finished: true,
            ..RemoteJob::new("done.0")
        }];
        assert!(monitor.resume([("t", jobs.as_slice()), ("done", finished.as_slice())]));
        assert_eq!(monitor.tasks_in_monitor(), vec!["t"]);

        monitor.update();
        assert_eq!(monitor.assign_job_ids("t", &mut jobs), 2);
        assert_eq!(jobs[0].job_id, Some(31));
        assert_eq!(jobs[1].job_id, Some(32));
        assert!(jobs[2].is_pending());
        assert_eq!(monitor.assign_job_ids("t", &mut jobs), 0);
    }
}
