//! Bounded retry with fixed backoff around a [`ProcessRunner`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::CommandSpec;
use crate::runner::{AttemptResult, ProcessRunner};

/// Retry bounds. Backoff is fixed between attempts, no jitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total invocations allowed, including the first.
    pub max_attempts: u32,
    /// Seconds slept between a failed attempt and the next one.
    pub backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 5,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

/// Invokes a command until it succeeds or `max_attempts` is exhausted.
///
/// Every non-zero exit (spawn failures included) is retried identically;
/// the caller decides whether a final failure is fatal.
#[derive(Clone)]
pub struct RetryExecutor {
    runner: Arc<dyn ProcessRunner>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, policy: RetryPolicy) -> Self {
        Self { runner, policy }
    }

    pub async fn execute(&self, description: &str, command: &CommandSpec) -> AttemptResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            info!(task = description, attempt, max_attempts, "Running");
            let result = self.runner.run(command).await.with_attempts(attempt);

            if result.succeeded {
                info!(status = "ok", task = description, attempts = attempt, "Completed");
                return result;
            }

            if attempt >= max_attempts {
                warn!(
                    status = "fail",
                    task = description,
                    attempts = attempt,
                    exit_code = result.exit_code,
                    "Giving up after exhausting retries"
                );
                return result;
            }

            warn!(
                status = "warn",
                task = description,
                attempt,
                exit_code = result.exit_code,
                backoff_secs = self.policy.backoff_secs,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(self.policy.backoff()).await;
            attempt += 1;
        }
    }
}
