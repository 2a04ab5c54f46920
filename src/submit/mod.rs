//! Job submission
//!
//! One `qsub` per planned node. Jobs are named `<task>.<index>` so the
//! monitor can match queued jobs back to their task by name alone.

mod identity;
mod job;
mod parameters;
mod submitter;

pub use identity::TaskIdentity;
pub use job::RemoteJob;
pub use parameters::{SubmissionParameters, SubmissionRequest};
pub use submitter::{JobSubmitter, SubmissionReport, NOT_RUN_EXIT_CODE, SUBMIT_TIMEOUT};
