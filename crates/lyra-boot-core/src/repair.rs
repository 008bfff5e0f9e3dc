//! One-shot dependency repair for an unavailable runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::command::CommandSpec;
use crate::error::FailureKind;
use crate::health::{HealthChecker, HealthStatus};
use crate::runner::{AttemptResult, ProcessRunner};
use crate::telemetry::Status;

/// Result of a reinstall command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinstallResult {
    pub command: String,
    pub result: AttemptResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// What the repair attempt did and the health it left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub reinstalls: Vec<ReinstallResult>,
    pub health: HealthStatus,
}

impl RepairOutcome {
    pub fn recovered(&self) -> bool {
        self.health.runtime_available
    }
}

/// Reinstalls dependencies once each, then re-probes health once.
///
/// Reinstall commands are not retried; a failed reinstall is logged and
/// the next one still runs.
#[derive(Clone)]
pub struct RepairAttempt {
    runner: Arc<dyn ProcessRunner>,
    reinstall_commands: Vec<CommandSpec>,
    checker: HealthChecker,
}

impl RepairAttempt {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        reinstall_commands: Vec<CommandSpec>,
        checker: HealthChecker,
    ) -> Self {
        Self {
            runner,
            reinstall_commands,
            checker,
        }
    }

    pub async fn run(&self) -> RepairOutcome {
        warn!(status = %Status::Warn, "Runtime unavailable, reinstalling dependencies");

        let mut reinstalls = Vec::with_capacity(self.reinstall_commands.len());
        for command in &self.reinstall_commands {
            let result = self.runner.run(command).await;
            if result.succeeded {
                info!(status = %Status::Ok, command = %command, "Reinstall finished");
            } else {
                warn!(
                    status = %Status::Fail,
                    command = %command,
                    exit_code = result.exit_code,
                    "Reinstall failed"
                );
            }
            reinstalls.push(ReinstallResult {
                command: command.to_string(),
                result,
                failure: FailureKind::classify(&result, FailureKind::RuntimeUnavailable),
            });
        }

        let health = self.checker.check().await;
        if health.runtime_available {
            info!(status = %Status::Ok, "Runtime recovered after reinstall");
        }
        RepairOutcome { reinstalls, health }
    }
}
