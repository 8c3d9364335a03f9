//! Normalized execution results.

use std::time::Duration;

use crate::error::{Error, ErrorKind};
use crate::execute::CommandError;

/// Terminal state of one submission.
///
/// Every path through the pipeline ends in one of these; stdout and stderr
/// are always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Failure class; `None` when the program ran to completion.
    pub error_kind: Option<ErrorKind>,
    /// Human-readable explanation of the failure.
    pub message: Option<String>,
    /// Wall-clock time of the compile command, if one ran.
    pub compile_duration: Option<Duration>,
    /// Wall-clock time of the run command, if it was reached.
    pub execution_duration: Option<Duration>,
    /// Resolved language id.
    pub language: Option<String>,
    /// Exit code of the program when it exited normally.
    pub exit_code: Option<i32>,
    /// The program ran and exited with status 0.
    pub succeeded: bool,
}

impl ExecutionResult {
    pub fn compile_duration_ms(&self) -> Option<u64> {
        self.compile_duration.map(duration_ms)
    }

    pub fn execution_duration_ms(&self) -> Option<u64> {
        self.execution_duration.map(duration_ms)
    }

    /// Result for a submission rejected before any subprocess ran.
    pub fn rejected(error: &Error, language: Option<String>) -> Self {
        Report::new(language).fail(error.kind(), error.to_string())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Accumulates stage results while the pipeline runs.
#[derive(Debug, Default)]
pub(crate) struct Report {
    stdout: String,
    stderr: String,
    language: Option<String>,
    compile_duration: Option<Duration>,
    execution_duration: Option<Duration>,
}

impl Report {
    pub(crate) fn new(language: Option<String>) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }

    pub(crate) fn compiled(&mut self, elapsed: Duration) {
        self.compile_duration = Some(elapsed);
    }

    pub(crate) fn ran(&mut self, elapsed: Duration) {
        self.execution_duration = Some(elapsed);
    }

    /// Append captured output, decoding lossily.
    pub(crate) fn capture(&mut self, stdout: &[u8], stderr: &[u8]) {
        self.stdout.push_str(&String::from_utf8_lossy(stdout));
        self.stderr.push_str(&String::from_utf8_lossy(stderr));
    }

    /// The program ran to completion with `exit_code`.
    pub(crate) fn exited(self, exit_code: Option<i32>) -> ExecutionResult {
        let succeeded = exit_code == Some(0);
        self.finish(None, None, exit_code, succeeded)
    }

    /// The pipeline ended in a failure of `kind`.
    ///
    /// The message is also appended to stderr so clients rendering only the
    /// two streams still see it.
    pub(crate) fn fail(mut self, kind: ErrorKind, message: String) -> ExecutionResult {
        if !self.stderr.is_empty() && !self.stderr.ends_with('\n') {
            self.stderr.push('\n');
        }
        self.stderr.push_str(&message);
        self.finish(Some(kind), Some(message), None, false)
    }

    /// Classify a subprocess error from `stage` ("Compilation" or "Execution").
    pub(crate) fn command_failed(mut self, stage: &str, err: CommandError) -> ExecutionResult {
        let (stdout, stderr) = err.partial_output();
        self.capture(stdout, stderr);

        match &err {
            CommandError::Timeout { budget, .. } => self.fail(
                ErrorKind::Timeout,
                format!("{} timed out after {} ms", stage, duration_ms(*budget)),
            ),
            CommandError::OutputOverflow { limit, .. } => self.fail(
                ErrorKind::RuntimeFailure,
                format!(
                    "{} aborted: output exceeded the {} byte buffer",
                    stage, limit
                ),
            ),
            CommandError::Spawn { .. } | CommandError::Io { .. } => {
                self.fail(ErrorKind::RuntimeFailure, format!("{} failed: {}", stage, err))
            }
        }
    }

    fn finish(
        self,
        error_kind: Option<ErrorKind>,
        message: Option<String>,
        exit_code: Option<i32>,
        succeeded: bool,
    ) -> ExecutionResult {
        ExecutionResult {
            stdout: self.stdout,
            stderr: self.stderr,
            error_kind,
            message,
            compile_duration: self.compile_duration,
            execution_duration: self.execution_duration,
            language: self.language,
            exit_code,
            succeeded,
        }
    }
}
