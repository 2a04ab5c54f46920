//! External process execution
//!
//! Every submission and queue query goes through [`ProcessRunner`], so tests
//! can replace the batch system with scripted output.

mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use runner::SystemProcessRunner;

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program path or name
    pub program: String,
    /// Arguments, passed without shell interpretation
    pub args: Vec<String>,
}

impl CommandLine {
    /// Create a command line with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Wrap this command so it runs on `host` over ssh
    pub fn over_ssh(self, host: &str) -> CommandLine {
        CommandLine::new("ssh")
            .arg(host)
            .arg(self.program)
            .args(self.args)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; -1 when the process was killed by a signal
    pub exit_code: i32,
    /// Standard output, one entry per line
    pub stdout: Vec<String>,
    /// Standard error, one entry per line
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a command line to completion with a timeout
pub trait ProcessRunner: Send + Sync {
    /// Run `command`, capturing output. Fails with a timeout error if the
    /// process does not finish within `timeout`.
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<ProcessOutput>;
}
