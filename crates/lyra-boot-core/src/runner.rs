//! External process execution.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::CommandSpec;

/// Exit code reported when the process could not be started at all.
///
/// Processes that ran and were killed by a signal report `128 + signo`,
/// so a negative code only ever means "never started".
pub const SPAWN_FAILURE_EXIT_CODE: i32 = -1;

/// Outcome of invoking a command, possibly across several attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    /// Whether the final attempt exited with code 0.
    pub succeeded: bool,

    /// Exit code of the final attempt.
    pub exit_code: i32,

    /// Number of invocations made (1 = no retries used).
    pub attempts: u32,
}

impl AttemptResult {
    /// Result of a single invocation that ran to completion.
    pub fn from_exit_code(exit_code: i32) -> Self {
        Self {
            succeeded: exit_code == 0,
            exit_code,
            attempts: 1,
        }
    }

    /// Result of a single invocation that could not be spawned.
    pub fn spawn_failure() -> Self {
        Self {
            succeeded: false,
            exit_code: SPAWN_FAILURE_EXIT_CODE,
            attempts: 1,
        }
    }

    /// Whether the process never started.
    pub fn is_spawn_failure(&self) -> bool {
        self.exit_code == SPAWN_FAILURE_EXIT_CODE
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Result of a command whose output was captured instead of forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub result: AttemptResult,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands. No retry logic of its own.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` with stdout/stderr forwarded to the orchestrator's own.
    async fn run(&self, command: &CommandSpec) -> AttemptResult;

    /// Run `command` and capture its output.
    async fn capture(&self, command: &CommandSpec) -> CapturedOutput;
}

/// [`ProcessRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn prepare(command: &CommandSpec) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).envs(&command.env);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> AttemptResult {
        debug!(command = %command, "Spawning process");

        let status = Self::prepare(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) => AttemptResult::from_exit_code(exit_code_of(status)),
            Err(e) => {
                warn!(status = "fail", program = %command.program, error = %e, "Could not start process");
                AttemptResult::spawn_failure()
            }
        }
    }

    async fn capture(&self, command: &CommandSpec) -> CapturedOutput {
        debug!(command = %command, "Spawning process (captured)");

        let output = Self::prepare(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => CapturedOutput {
                result: AttemptResult::from_exit_code(exit_code_of(output.status)),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => {
                warn!(status = "fail", program = %command.program, error = %e, "Could not start process");
                CapturedOutput {
                    result: AttemptResult::spawn_failure(),
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        }
    }
}

/// Map an exit status to a shell-style exit code.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_result_from_exit_code() {
        assert!(AttemptResult::from_exit_code(0).succeeded);
        let failed = AttemptResult::from_exit_code(2);
        assert!(!failed.succeeded);
        assert_eq!(failed.exit_code, 2);
        assert_eq!(failed.attempts, 1);
        assert!(!failed.is_spawn_failure());
    }

    #[test]
    fn test_spawn_failure_is_distinguishable() {
        let result = AttemptResult::spawn_failure();
        assert!(!result.succeeded);
        assert!(result.is_spawn_failure());
        assert_ne!(result.exit_code, AttemptResult::from_exit_code(127).exit_code);
    }

    #[tokio::test]
    async fn test_run_successful_command() {
        let result = SystemRunner.run(&CommandSpec::new("true")).await;
        assert!(result.succeeded);
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_failing_command_is_not_an_error() {
        let result = SystemRunner
            .run(&CommandSpec::new("sh").args(["-c", "exit 3"]))
            .await;
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, 3);
        assert!(!result.is_spawn_failure());
    }

    #[tokio::test]
    async fn test_run_missing_binary_reports_spawn_failure() {
        let result = SystemRunner
            .run(&CommandSpec::new("/nonexistent-binary-that-does-not-exist"))
            .await;
        assert!(!result.succeeded);
        assert!(result.is_spawn_failure());
    }

    #[tokio::test]
    async fn test_capture_applies_env_and_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let command = CommandSpec::new("sh")
            .args(["-c", "echo \"$LYRA_TEST_VAR\"; pwd"])
            .env("LYRA_TEST_VAR", "hello")
            .current_dir(dir.path());

        let output = SystemRunner.capture(&command).await;
        assert!(output.result.succeeded);
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        let cwd = std::path::PathBuf::from(lines.next().expect("pwd line"));
        assert_eq!(
            cwd.canonicalize().expect("canonical cwd"),
            dir.path().canonicalize().expect("canonical tempdir")
        );
    }
}
