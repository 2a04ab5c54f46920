//! Error types for BatchPlan
//!
//! Errors fall into two classes. Configuration errors (bad requests, no
//! architecture or queue that fits, missing submission fields, ambiguous
//! timestamp markers) halt processing for a task. Transient errors come from
//! the external batch system and are logged and retried on the next poll.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for BatchPlan operations
#[derive(Error, Debug)]
pub enum BatchPlanError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// No architecture has enough RAM for one subtask
    #[error("{}", insufficient_ram_message(.architecture, .gigs_per_subtask))]
    InsufficientRam {
        /// Pinned architecture, if the request named one
        architecture: Option<String>,
        /// RAM required per subtask in GB
        gigs_per_subtask: f64,
    },

    /// No auto-selectable queue covers the requested wall time
    #[error("No queue on {cluster} accepts a wall time of {wall_time_hours} hours")]
    NoQueueForWallTime {
        /// Requested wall time in hours
        wall_time_hours: f64,
        /// Cluster name
        cluster: String,
    },

    /// A pinned queue cannot cover the requested wall time
    #[error("Queue '{queue}' max wall time of {max_hours} hours is less than requested {wall_time_hours} hours")]
    QueueWallTimeExceeded {
        /// Queue name
        queue: String,
        /// Queue limit in hours
        max_hours: f64,
        /// Requested wall time in hours
        wall_time_hours: f64,
    },

    /// Architecture name not found in the catalog
    #[error("Unknown architecture '{name}' for cluster {cluster}")]
    UnknownArchitecture {
        /// Requested name
        name: String,
        /// Cluster name
        cluster: String,
    },

    /// Optimizer name not recognized
    #[error("Unknown architecture optimizer: {0}")]
    UnknownOptimizer(String),

    /// Resource request values are out of range
    #[error("Invalid resource request: {0}")]
    InvalidRequest(String),

    /// Required submission fields were not supplied
    #[error("Missing submission fields: {}", .0.join(", "))]
    MissingSubmissionFields(Vec<&'static str>),

    /// No timestamp marker found for an event
    #[error("No timestamp marker for event '{event}' in '{dir}'")]
    MarkerNotFound {
        /// Event name
        event: String,
        /// Directory searched
        dir: PathBuf,
    },

    /// More than one timestamp marker found for an event
    #[error("{count} timestamp markers for event '{event}' in '{dir}'")]
    AmbiguousMarker {
        /// Event name
        event: String,
        /// Directory searched
        dir: PathBuf,
        /// Number of matching files
        count: usize,
    },

    /// Timestamp marker name does not carry a millisecond value
    #[error("Unparsable timestamp marker '{0}'")]
    UnparsableMarker(PathBuf),

    /// Queue command failed; expected to clear on a later poll
    #[error("Queue command '{command}' failed: {message}")]
    QueueCommandFailed {
        /// Command line that failed
        command: String,
        /// Failure description
        message: String,
    },

    /// External command exceeded its timeout
    #[error("Command '{command}' timed out after {seconds} seconds")]
    Timeout {
        /// Command line
        command: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error for requests, plans or config
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// Context message
        context: String,
        /// Wrapped error
        #[source]
        source: Box<BatchPlanError>,
    },
}

fn insufficient_ram_message(architecture: &Option<String>, gigs_per_subtask: &f64) -> String {
    match architecture {
        Some(name) => format!(
            "Architecture '{}' has insufficient RAM for subtasks requiring {} GB",
            name, gigs_per_subtask
        ),
        None => format!(
            "No architecture has sufficient RAM for subtasks requiring {} GB",
            gigs_per_subtask
        ),
    }
}

impl BatchPlanError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a queue command failure
    pub fn queue_command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueCommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error came from the external batch system and should be
    /// retried on the next poll rather than halting the task
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io { .. } | Self::QueueCommandFailed { .. } | Self::Timeout { .. } => true,
            Self::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::MarkerNotFound { dir: path, .. }
            | Self::AmbiguousMarker { dir: path, .. }
            | Self::UnparsableMarker(path) => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for BatchPlan operations
pub type Result<T> = std::result::Result<T, BatchPlanError>;

impl From<std::io::Error> for BatchPlanError {
    fn from(err: std::io::Error) -> Self {
        BatchPlanError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for BatchPlanError {
    fn from(err: serde_json::Error) -> Self {
        BatchPlanError::Serialization(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| BatchPlanError::io(path, e))
    }
}
