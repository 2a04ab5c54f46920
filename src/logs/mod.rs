//! Cluster log files and timestamp markers

pub mod marker;
pub mod reader;

pub use marker::{PhaseDurations, TimestampEvent};
pub use reader::{exit_comment, exit_status};
