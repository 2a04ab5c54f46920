//! Timestamp marker files
//!
//! A marker is a file named `<event>.<epochMillis>`; there is at most one
//! per event in a directory. Phase durations are differences between
//! markers.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BatchPlanError, IoResultExt, Result};

/// Events recorded while a task moves through the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampEvent {
    /// Task arrived on the front end
    ArriveFrontEnd,
    /// Task queued locally for submission
    Queued,
    /// Jobs handed to PBS
    QueuedPbs,
    /// A PBS job started
    PbsJobStart,
    /// A PBS job finished
    PbsJobFinish,
    /// A subtask started
    SubtaskStart,
    /// A subtask finished
    SubtaskFinish,
}

impl TimestampEvent {
    /// File name prefix for the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::ArriveFrontEnd => "arrive-front-end",
            Self::Queued => "queued",
            Self::QueuedPbs => "queued-pbs",
            Self::PbsJobStart => "pbs-job-start",
            Self::PbsJobFinish => "pbs-job-finish",
            Self::SubtaskStart => "subtask-start",
            Self::SubtaskFinish => "subtask-finish",
        }
    }

    fn prefix(&self) -> String {
        format!("{}.", self.name())
    }
}

impl fmt::Display for TimestampEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn markers(dir: &Path, event: TimestampEvent) -> Result<Vec<PathBuf>> {
    let prefix = event.prefix();
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            found.push(entry.path());
        }
    }
    Ok(found)
}

/// Record `event` now, replacing any earlier marker. Returns the timestamp.
pub fn create(dir: &Path, event: TimestampEvent) -> Result<i64> {
    let millis = chrono::Utc::now().timestamp_millis();
    create_at(dir, event, millis)?;
    Ok(millis)
}

/// Record `event` at `millis`, replacing any earlier marker
pub fn create_at(dir: &Path, event: TimestampEvent, millis: i64) -> Result<()> {
    for old in markers(dir, event)? {
        fs::remove_file(&old).with_path(&old)?;
    }
    let path = dir.join(format!("{}{}", event.prefix(), millis));
    fs::write(&path, millis.to_string()).with_path(&path)?;
    Ok(())
}

/// Timestamp of the single marker for `event`
pub fn timestamp(dir: &Path, event: TimestampEvent) -> Result<i64> {
    let mut found = markers(dir, event)?;
    if found.len() > 1 {
        return Err(BatchPlanError::AmbiguousMarker {
            event: event.name().to_string(),
            dir: dir.to_path_buf(),
            count: found.len(),
        });
    }
    let path = found.pop().ok_or_else(|| BatchPlanError::MarkerNotFound {
        event: event.name().to_string(),
        dir: dir.to_path_buf(),
    })?;
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(&event.prefix()))
        .and_then(|millis| millis.parse().ok())
        .ok_or(BatchPlanError::UnparsableMarker(path))
}

/// Milliseconds from `start` to `finish`. A marker that exists but cannot
/// be parsed counts as zero elapsed time.
pub fn elapsed_millis(dir: &Path, start: TimestampEvent, finish: TimestampEvent) -> Result<i64> {
    let pair = timestamp(dir, start).and_then(|s| Ok((s, timestamp(dir, finish)?)));
    match pair {
        Ok((start_ms, finish_ms)) => Ok(finish_ms - start_ms),
        Err(BatchPlanError::UnparsableMarker(path)) => {
            tracing::warn!("Unparsable timestamp marker {}", path.display());
            Ok(0)
        }
        Err(e) => Err(e),
    }
}

/// Time spent in each phase, in milliseconds; `None` until both markers exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseDurations {
    /// Front-end arrival to PBS submission
    pub front_end_wait: Option<i64>,
    /// PBS submission to job start
    pub queue_wait: Option<i64>,
    /// Job start to job finish
    pub run_time: Option<i64>,
}

impl PhaseDurations {
    /// Read the phase durations recorded in `dir`
    pub fn collect(dir: &Path) -> PhaseDurations {
        let phase = |start: TimestampEvent, finish: TimestampEvent| {
            match elapsed_millis(dir, start, finish) {
                Ok(ms) => Some(ms),
                Err(e) => {
                    tracing::debug!("Phase {} -> {} unavailable: {}", start, finish, e);
                    None
                }
            }
        };
        PhaseDurations {
            front_end_wait: phase(TimestampEvent::ArriveFrontEnd, TimestampEvent::QueuedPbs),
            queue_wait: phase(TimestampEvent::QueuedPbs, TimestampEvent::PbsJobStart),
            run_time: phase(TimestampEvent::PbsJobStart, TimestampEvent::PbsJobFinish),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn count_files(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        create_at(dir.path(), TimestampEvent::PbsJobStart, 1_700_000_000_123).unwrap();
        assert_eq!(
            timestamp(dir.path(), TimestampEvent::PbsJobStart).unwrap(),
            1_700_000_000_123
        );
        let content =
            fs::read_to_string(dir.path().join("pbs-job-start.1700000000123")).unwrap();
        assert_eq!(content, "1700000000123");
    }

    #[test]
    fn test_create_replaces_previous_marker() {
        let dir = TempDir::new().unwrap();
        create_at(dir.path(), TimestampEvent::Queued, 1000).unwrap();
        create_at(dir.path(), TimestampEvent::QueuedPbs, 1500).unwrap();
        let now = create(dir.path(), TimestampEvent::Queued).unwrap();

        assert_eq!(count_files(dir.path()), 2);
        assert_eq!(timestamp(dir.path(), TimestampEvent::Queued).unwrap(), now);
        assert_eq!(timestamp(dir.path(), TimestampEvent::QueuedPbs).unwrap(), 1500);
    }

    #[test]
    fn test_missing_and_ambiguous_markers() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            timestamp(dir.path(), TimestampEvent::SubtaskStart),
            Err(BatchPlanError::MarkerNotFound { .. })
        ));

        fs::write(dir.path().join("subtask-start.100"), "").unwrap();
        fs::write(dir.path().join("subtask-start.200"), "").unwrap();
        assert!(matches!(
            timestamp(dir.path(), TimestampEvent::SubtaskStart),
            Err(BatchPlanError::AmbiguousMarker { count: 2, .. })
        ));
    }

    #[test]
    fn test_elapsed() {
        let dir = TempDir::new().unwrap();
        create_at(dir.path(), TimestampEvent::PbsJobStart, 10_000).unwrap();
        create_at(dir.path(), TimestampEvent::PbsJobFinish, 25_500).unwrap();
        assert_eq!(
            elapsed_millis(dir.path(), TimestampEvent::PbsJobStart, TimestampEvent::PbsJobFinish)
                .unwrap(),
            15_500
        );
    }

    #[test]
    fn test_elapsed_unparsable_is_zero() {
        let dir = TempDir::new().unwrap();
        create_at(dir.path(), TimestampEvent::SubtaskStart, 10_000).unwrap();
        fs::write(dir.path().join("subtask-finish.soon"), "").unwrap();
        assert_eq!(
            elapsed_millis(dir.path(), TimestampEvent::SubtaskStart, TimestampEvent::SubtaskFinish)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_phase_durations() {
        let dir = TempDir::new().unwrap();
        create_at(dir.path(), TimestampEvent::ArriveFrontEnd, 1_000).unwrap();
        create_at(dir.path(), TimestampEvent::QueuedPbs, 3_000).unwrap();
        create_at(dir.path(), TimestampEvent::PbsJobStart, 10_000).unwrap();

        let phases = PhaseDurations::collect(dir.path());
        assert_eq!(phases.front_end_wait, Some(2_000));
        assert_eq!(phases.queue_wait, Some(7_000));
        assert_eq!(phases.run_time, None);
    }
}
