//! Process runner backed by `std::process`

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::{CommandLine, ProcessOutput, ProcessRunner};
use crate::error::{BatchPlanError, Result};

/// Spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    /// Create a new runner
    pub fn new() -> Self {
        Self
    }
}

fn collect_lines<R: Read + Send + 'static>(stream: Option<R>) -> JoinHandle<Vec<String>> {
    thread::spawn(move || match stream {
        Some(stream) => BufReader::new(stream)
            .lines()
            .map_while(|line| line.ok())
            .collect(),
        None => Vec::new(),
    })
}

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<ProcessOutput> {
        tracing::debug!("Running: {}", command);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BatchPlanError::queue_command(command.to_string(), e.to_string()))?;

        // Drain pipes concurrently so a chatty child cannot block on a full pipe
        let stdout = collect_lines(child.stdout.take());
        let stderr = collect_lines(child.stderr.take());

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                if let Err(e) = child.kill() {
                    tracing::warn!("Failed to kill '{}': {}", command, e);
                }
                let _ = child.wait();
                return Err(BatchPlanError::Timeout {
                    command: command.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            Err(e) => {
                return Err(BatchPlanError::queue_command(command.to_string(), e.to_string()));
            }
        };

        Ok(ProcessOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}
