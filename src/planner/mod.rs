//! Resource planning
//!
//! Converts a task's declared needs into a concrete cluster request.

mod engine;
mod metrics;
mod optimizer;
mod plan;
mod request;

pub use engine::{round_up_to_quarter_hour, ResourcePlanner};
pub use metrics::*;
pub use optimizer::ArchitectureOptimizer;
pub use plan::*;
pub use request::ResourceRequest;
