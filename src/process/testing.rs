//! Scripted process runner for unit tests

use std::sync::Mutex;
use std::time::Duration;

use super::{CommandLine, ProcessOutput, ProcessRunner};
use crate::error::{BatchPlanError, Result};

enum Response {
    Output(ProcessOutput),
    Fail,
}

/// Returns canned output for commands containing a key; records every call
pub(crate) struct ScriptedRunner {
    responses: Mutex<Vec<(String, Response)>>,
    calls: Mutex<Vec<CommandLine>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Commands whose text contains `key` exit with `exit_code` and print `stdout`
    pub(crate) fn respond(self, key: &str, exit_code: i32, stdout: &[&str]) -> Self {
        self.responses.lock().unwrap().push((
            key.to_string(),
            Response::Output(ProcessOutput {
                exit_code,
                stdout: stdout.iter().map(|s| s.to_string()).collect(),
                stderr: Vec::new(),
            }),
        ));
        self
    }

    /// Commands whose text contains `key` fail to run at all
    pub(crate) fn fail(self, key: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((key.to_string(), Response::Fail));
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, command: &CommandLine, _timeout: Duration) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let text = command.to_string();
        let responses = self.responses.lock().unwrap();
        match responses.iter().find(|(key, _)| text.contains(key.as_str())) {
            Some((_, Response::Output(output))) => Ok(output.clone()),
            Some((_, Response::Fail)) => Err(BatchPlanError::queue_command(text, "scripted failure")),
            None => Ok(ProcessOutput::default()),
        }
    }
}
