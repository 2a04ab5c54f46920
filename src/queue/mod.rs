//! Cluster queue access
//!
//! All scraping of PBS command output lives in [`protocol`]; the
//! [`QueueCommands`] trait runs the commands.

mod commands;
mod pbs;
pub mod protocol;
#[cfg(test)]
pub(crate) mod testing;

pub use commands::QueueCommands;
pub use pbs::{queue_commands, LocalQueueCommands, RemoteQueueCommands};
pub use protocol::{JobInformation, JobServer, QueueEntry, ResourceUsage};
