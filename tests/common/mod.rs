#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;

use devdb::manage::process::{CommandError, CommandRunner, Invocation};
use devdb::manage::retry::RetryPolicy;
use devdb::manage::ManagementConfig;

lazy_static! {
    /// Default config with a retry interval short enough for tests.
    pub static ref CONFIG: ManagementConfig = ManagementConfig {
        retry: RetryPolicy::new(Duration::from_millis(1), None),
        ..ManagementConfig::default()
    };
}

type Responder = Box<dyn Fn(&Invocation, usize) -> Result<String, CommandError> + Send + Sync>;

/// Records every invocation and answers from a closure instead of spawning
/// processes. The closure also gets the number of earlier calls with the
/// same command line.
pub struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    responder: Responder,
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> ScriptedRunner
    where
        F: Fn(&Invocation, usize) -> Result<String, CommandError> + Send + Sync + 'static,
    {
        ScriptedRunner {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Every command succeeds with no output.
    pub fn succeeding() -> ScriptedRunner {
        ScriptedRunner::new(|_, _| Ok(String::new()))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Argument lists only, for terse assertions.
    pub fn arg_lists(&self) -> Vec<Vec<String>> {
        self.calls().into_iter().map(|call| call.args).collect()
    }

    /// SQL passed to `mysql -e`, in call order.
    pub fn sql(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.args.first().map(String::as_str) == Some("exec"))
            .filter_map(|call| call.args.last().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let previous = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls
                .iter()
                .filter(|call| call.command_line() == invocation.command_line())
                .count();
            calls.push(invocation.clone());
            previous
        };
        (self.responder)(invocation, previous)
    }
}

pub fn failure(stderr: &str) -> CommandError {
    CommandError::ExecutionFailed {
        command: "scripted".to_string(),
        exit_code: Some(1),
        stderr: stderr.to_string(),
        stdout: String::new(),
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
