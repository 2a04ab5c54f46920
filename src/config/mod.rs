//! Configuration for BatchPlan
//!
//! Command-line arguments for the binary and the JSON remote execution
//! configuration the library reads.

mod remote;
mod settings;

pub use remote::*;
pub use settings::*;
