//! Queue-time metrics reported by the cluster
//!
//! NAS publishes, per architecture, a queue depth ("runout" time) and a
//! queue-time expansion factor through its `qs` tool. The planner only sees
//! the [`QueueMetrics`] trait.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cluster::{architectures, NodeArchitecture, RemoteCluster};
use crate::error::{IoResultExt, Result};
use crate::process::{CommandLine, ProcessRunner};

/// Source of per-architecture queue metrics
pub trait QueueMetrics: Send {
    /// Queue depth for an architecture, if reported
    fn queue_depth(&self, architecture: &NodeArchitecture) -> Option<f64>;

    /// Queue-time expansion multiplier for an architecture, if reported
    fn queue_time_expansion(&self, architecture: &NodeArchitecture) -> Option<f64>;

    /// Refresh cached values; a no-op for fixed sources
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Fixed metric values keyed by architecture name
#[derive(Debug, Clone, Default)]
pub struct StaticQueueMetrics {
    depths: HashMap<String, f64>,
    expansions: HashMap<String, f64>,
}

impl StaticQueueMetrics {
    /// Create an empty metric set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue depth for an architecture
    pub fn with_depth(mut self, architecture: &str, depth: f64) -> Self {
        self.depths.insert(architecture.to_string(), depth);
        self
    }

    /// Set the queue-time expansion for an architecture
    pub fn with_expansion(mut self, architecture: &str, expansion: f64) -> Self {
        self.expansions.insert(architecture.to_string(), expansion);
        self
    }
}

impl QueueMetrics for StaticQueueMetrics {
    fn queue_depth(&self, architecture: &NodeArchitecture) -> Option<f64> {
        self.depths.get(architecture.name).copied()
    }

    fn queue_time_expansion(&self, architecture: &NodeArchitecture) -> Option<f64> {
        self.expansions.get(architecture.name).copied()
    }
}

/// Default interval between `qs` runs
pub const QS_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default NASA directorate column in the `qs` report
pub const DEFAULT_DIRECTORATE: &str = "SMD";

/// Metrics read from the NAS `qs --runout` CSV report
pub struct QsQueueMetrics {
    runner: Arc<dyn ProcessRunner>,
    csv_path: PathBuf,
    directorate: String,
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
    metrics: StaticQueueMetrics,
}

impl QsQueueMetrics {
    /// Create a metrics source writing its report to `csv_path`
    pub fn new(runner: Arc<dyn ProcessRunner>, csv_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            csv_path: csv_path.into(),
            directorate: DEFAULT_DIRECTORATE.to_string(),
            refresh_interval: QS_REFRESH_INTERVAL,
            last_refresh: None,
            metrics: StaticQueueMetrics::new(),
        }
    }

    /// Use a different directorate column
    pub fn with_directorate(mut self, directorate: &str) -> Self {
        self.directorate = directorate.to_uppercase();
        self
    }

    /// Change the refresh interval
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    fn due(&self) -> bool {
        self.last_refresh
            .map_or(true, |at| at.elapsed() >= self.refresh_interval)
    }
}

impl QueueMetrics for QsQueueMetrics {
    fn queue_depth(&self, architecture: &NodeArchitecture) -> Option<f64> {
        self.metrics.queue_depth(architecture)
    }

    fn queue_time_expansion(&self, architecture: &NodeArchitecture) -> Option<f64> {
        self.metrics.queue_time_expansion(architecture)
    }

    fn refresh(&mut self) -> Result<()> {
        if !self.due() {
            return Ok(());
        }
        let command = CommandLine::new("qs")
            .arg("--onlyRunout")
            .arg("--runout")
            .arg(self.csv_path.to_string_lossy());

        // qs is flaky; an older report on disk is still usable
        match self.runner.run(&command, Duration::from_secs(300)) {
            Ok(output) if !output.success() => {
                tracing::warn!("qs exited with status {}", output.exit_code)
            }
            Err(e) => tracing::warn!("qs failed: {}", e),
            Ok(_) => {}
        }

        let text = fs::read_to_string(&self.csv_path).with_path(&self.csv_path)?;
        self.metrics = parse_qs_csv(&text, &self.directorate);
        self.last_refresh = Some(Instant::now());
        Ok(())
    }
}

/// Parse a `qs --runout` report.
///
/// Row 0 names the directorates, row 1 is a header, the remaining rows start
/// with a 3-letter architecture prefix. Each directorate spans four columns;
/// runout (queue depth) is the 4th column of a block and expansion the 5th.
pub fn parse_qs_csv(text: &str, directorate: &str) -> StaticQueueMetrics {
    let rows: Vec<Vec<String>> = text.lines().map(split_csv_record).collect();

    let mut metrics = StaticQueueMetrics::new();
    let Some(divisions) = rows.first() else {
        return metrics;
    };
    let Some(index) = divisions
        .iter()
        .filter(|f| !f.is_empty())
        .position(|f| f.eq_ignore_ascii_case(directorate))
    else {
        tracing::warn!("Directorate {} not found in qs report", directorate);
        return metrics;
    };
    let runout_col = 3 + 4 * index;
    let expansion_col = 4 + 4 * index;

    for row in rows.iter().skip(2) {
        let Some(prefix) = row.first() else { continue };
        let Some(arch) = architectures(RemoteCluster::Nas)
            .iter()
            .find(|a| a.short_name() == prefix.as_str())
        else {
            continue;
        };
        if let Some(depth) = row.get(runout_col).and_then(|v| v.parse::<f64>().ok()) {
            metrics = metrics.with_depth(arch.name, depth);
        }
        if let Some(expansion) = row.get(expansion_col).and_then(|v| v.parse::<f64>().ok()) {
            metrics = metrics.with_expansion(arch.name, expansion);
        }
    }
    metrics
}

/// Split one CSV record. Quoted fields may hold commas and `""` escapes.
fn split_csv_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}
