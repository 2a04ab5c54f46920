//! In-memory queue for unit tests

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::protocol::parse_job_id;
use super::QueueCommands;
use crate::error::{BatchPlanError, Result};

/// Serves canned `qstat` listings and long-form dumps; records deletions
pub(crate) struct FakeQueue {
    owner: String,
    host: String,
    listing: Mutex<Vec<String>>,
    long_form: Mutex<BTreeMap<u64, Vec<String>>>,
    failing: Mutex<bool>,
    queries: Mutex<Vec<Vec<String>>>,
    deleted: Mutex<Vec<u64>>,
}

impl FakeQueue {
    pub(crate) fn new(owner: &str, host: &str) -> Self {
        Self {
            owner: owner.to_string(),
            host: host.to_string(),
            listing: Mutex::new(Vec::new()),
            long_form: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(false),
            queries: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_listing(self, lines: &[&str]) -> Self {
        self.set_listing(lines);
        self
    }

    pub(crate) fn with_long_form(self, id: u64, lines: &[&str]) -> Self {
        self.set_long_form(id, lines);
        self
    }

    /// Replace the tabular listing
    pub(crate) fn set_listing(&self, lines: &[&str]) {
        *self.listing.lock().unwrap() = lines.iter().map(|l| l.to_string()).collect();
    }

    pub(crate) fn set_long_form(&self, id: u64, lines: &[&str]) {
        self.long_form
            .lock()
            .unwrap()
            .insert(id, lines.iter().map(|l| l.to_string()).collect());
    }

    /// Make every `qstat` call fail until reset
    pub(crate) fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub(crate) fn queries(&self) -> Vec<Vec<String>> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<u64> {
        self.deleted.lock().unwrap().clone()
    }
}

impl QueueCommands for FakeQueue {
    fn qstat(&self, args: &[String]) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(args.to_vec());
        if *self.failing.lock().unwrap() {
            return Err(BatchPlanError::queue_command("qstat", "connection reset"));
        }
        let ids: Vec<u64> = args.iter().filter_map(|a| a.parse().ok()).collect();
        match args.first().map(String::as_str) {
            Some("-xf") => {
                let long_form = self.long_form.lock().unwrap();
                Ok(ids
                    .iter()
                    .filter_map(|id| long_form.get(id))
                    .flatten()
                    .cloned()
                    .collect())
            }
            Some("-x") => Ok(self
                .listing
                .lock()
                .unwrap()
                .iter()
                .filter(|line| {
                    line.split_whitespace()
                        .next()
                        .and_then(parse_job_id)
                        .is_some_and(|id| ids.contains(&id))
                })
                .cloned()
                .collect()),
            _ => Ok(self.listing.lock().unwrap().clone()),
        }
    }

    fn qdel(&self, ids: &[u64]) -> Result<()> {
        self.deleted.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn host(&self) -> &str {
        &self.host
    }
}
