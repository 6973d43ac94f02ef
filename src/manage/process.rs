use std::borrow::Cow;
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, trace};
use thiserror::Error;
use tokio::process::Command;

use crate::manage::retry::FailureReason;

#[derive(Debug, Error)]
pub enum CommandError {
    /// The command ran but exited non-zero.
    #[error("Command '{command}' failed with exit code {exit_code:?}: {stderr}")]
    ExecutionFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
        stdout: String,
    },
    /// The program could not be spawned at all, e.g. it is not on PATH.
    #[error("Failed to execute '{command}': {message}")]
    LaunchFailed { command: String, message: String },
}

/// Only what the program itself reported. The command line can carry SQL
/// with names and passwords, so it is kept out.
impl FailureReason for CommandError {
    fn reason(&self) -> Cow<'_, str> {
        match self {
            CommandError::ExecutionFailed { stderr, .. } => Cow::Borrowed(stderr.as_str()),
            CommandError::LaunchFailed { message, .. } => Cow::Borrowed(message.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collect stdout and stderr; stdout is returned on success.
    Capture,
    /// Connect the child's stdio to ours. Nothing is returned.
    Inherit,
}

/// One external program call. The child sees our environment plus `envs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub mode: OutputMode,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: S) -> Invocation {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            mode: OutputMode::Capture,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Invocation {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Invocation {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn inherit(mut self) -> Invocation {
        self.mode = OutputMode::Inherit;
        self
    }

    /// Program and arguments joined for logs and error messages. Environment
    /// overrides are left out since they may hold passwords.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Seam between the lifecycle code and the operating system.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation` to completion. Captured stdout is returned in
    /// capture mode; inherit mode returns an empty string.
    async fn run(&self, invocation: &Invocation) -> Result<String, CommandError>;
}

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> ProcessRunner {
        ProcessRunner
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let command_line = invocation.command_line();
        debug!("Running {} ({:?})", &command_line, invocation.mode);

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit());

        let launch_failed = |err: std::io::Error| CommandError::LaunchFailed {
            command: command_line.clone(),
            message: err.to_string(),
        };

        match invocation.mode {
            OutputMode::Capture => {
                let output = command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(launch_failed)?;
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                trace!(
                    "{} exited with {:?}; stdout: {:?}; stderr: {:?}",
                    &command_line,
                    output.status.code(),
                    &stdout,
                    &stderr
                );
                if !output.status.success() {
                    return Err(CommandError::ExecutionFailed {
                        command: command_line,
                        exit_code: output.status.code(),
                        stderr,
                        stdout,
                    });
                }
                Ok(stdout)
            }
            OutputMode::Inherit => {
                let status = command
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(launch_failed)?;
                trace!("{} exited with {:?}", &command_line, status.code());
                if !status.success() {
                    return Err(CommandError::ExecutionFailed {
                        command: command_line,
                        exit_code: status.code(),
                        stderr: String::new(),
                        stdout: String::new(),
                    });
                }
                Ok(String::new())
            }
        }
    }
}
