//! Child process execution of the program under test

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::config::HarnessConfig;
use crate::HarnessError;

/// How a fixture's program run is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Direct invocation of the executable
    Plain,
    /// Invocation through the memory-error detector
    Detector,
}

/// Why an execution produced no usable output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// The child could not be started
    Spawn,
    /// Feeding stdin or collecting output failed
    Io,
    /// The child did not finish before the deadline and was killed
    TimedOut,
}

/// Captured result of one process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub mode: ExecutionMode,
    pub duration: Duration,
    pub failure: Option<ExecutionFailure>,
}

impl ExecutionResult {
    /// A failed invocation: empty stdout, the diagnostic as stderr, exit code 1
    pub fn failed(
        mode: ExecutionMode,
        failure: ExecutionFailure,
        message: String,
        duration: Duration,
    ) -> Self {
        Self {
            stdout: String::new(),
            stderr: message,
            exit_code: 1,
            mode,
            duration,
            failure: Some(failure),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Memory-error detector invocation prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Runs the program under test for one fixture input
#[derive(Debug, Clone)]
pub struct TargetExecutor {
    executable: PathBuf,
    detector: DetectorCommand,
    timeout: Duration,
}

impl TargetExecutor {
    pub fn new(executable: impl Into<PathBuf>, detector: DetectorCommand, timeout: Duration) -> Self {
        Self { executable: executable.into(), detector, timeout }
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let detector =
            DetectorCommand { program: config.detector.clone(), args: config.detector_argv()? };
        Ok(Self::new(&config.executable, detector, config.timeout_duration()))
    }

    /// Run the program with `input` on stdin.
    ///
    /// Never fails: spawn, pipe and timeout errors are folded into the result.
    pub async fn execute(&self, input: &str, mode: ExecutionMode) -> ExecutionResult {
        let start_time = Instant::now();

        match timeout(self.timeout, self.run_command(input, mode)).await {
            Ok(Ok(result)) => result,
            Ok(Err((failure, e))) => {
                log::debug!("Error running {}: {}", self.executable.display(), e);
                ExecutionResult::failed(mode, failure, e.to_string(), start_time.elapsed())
            }
            Err(_) => ExecutionResult::failed(
                mode,
                ExecutionFailure::TimedOut,
                format!("Timed out after {:.2?}", self.timeout),
                start_time.elapsed(),
            ),
        }
    }

    fn command(&self, mode: ExecutionMode) -> TokioCommand {
        match mode {
            ExecutionMode::Plain => TokioCommand::new(&self.executable),
            ExecutionMode::Detector => {
                let mut cmd = TokioCommand::new(&self.detector.program);
                cmd.args(&self.detector.args).arg(&self.executable);
                cmd
            }
        }
    }

    async fn run_command(
        &self,
        input: &str,
        mode: ExecutionMode,
    ) -> Result<ExecutionResult, (ExecutionFailure, HarnessError)> {
        let start_time = Instant::now();

        let mut cmd = self.command(mode);
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        log::debug!("Spawning {:?} ({:?} mode)", cmd.as_std(), mode);

        let mut child = cmd.spawn().map_err(|e| {
            (ExecutionFailure::Spawn, HarnessError::Execution(format!("Failed to spawn command: {}", e)))
        })?;

        // Feed stdin concurrently so a child that writes before it reads cannot
        // deadlock on a full stdout pipe.
        let stdin = child.stdin.take();
        let data = input.as_bytes().to_vec();
        let writer = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(&data).await {
                    // The child may exit without consuming its input.
                    log::debug!("Failed to write stdin: {}", e);
                }
                let _ = stdin.shutdown().await;
            }
        };

        let (_, output) = tokio::join!(writer, child.wait_with_output());
        let output = output.map_err(|e| {
            (ExecutionFailure::Io, HarnessError::Execution(format!("Command execution error: {}", e)))
        })?;

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            mode,
            duration: start_time.elapsed(),
            failure: None,
        })
    }
}
