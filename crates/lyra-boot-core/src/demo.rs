//! Demo workloads run after provisioning.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::DemoTarget;
use crate::error::FailureKind;
use crate::retry::RetryExecutor;
use crate::telemetry::Status;

/// Outcome of one demo workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoRecord {
    pub description: String,
    pub succeeded: bool,
    pub attempts: u32,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// Aggregate of one demo stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoSummary {
    pub records: Vec<DemoRecord>,
}

impl DemoSummary {
    pub fn succeeded_count(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.succeeded).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Runs every demo workload exactly once per pipeline run, in order.
///
/// A failed workload never stops the next one. Outputs of failed runs are
/// left on disk.
pub struct DemoStage {
    executor: RetryExecutor,
    targets: Vec<DemoTarget>,
}

impl DemoStage {
    pub fn new(executor: RetryExecutor, targets: Vec<DemoTarget>) -> Self {
        Self { executor, targets }
    }

    pub async fn run(&self) -> DemoSummary {
        let mut summary = DemoSummary::default();

        for target in &self.targets {
            let result = self
                .executor
                .execute(&target.description, &target.invocation)
                .await;
            let failure = FailureKind::classify(&result, FailureKind::WorkloadFailure);
            if let Some(failure) = failure {
                warn!(status = %Status::Fail, demo = %target.description, ?failure, "Demo failed, continuing");
            }
            summary.records.push(DemoRecord {
                description: target.description.clone(),
                succeeded: result.succeeded,
                attempts: result.attempts,
                exit_code: result.exit_code,
                failure,
            });
        }

        let status = if summary.all_succeeded() {
            Status::Ok
        } else {
            Status::Warn
        };
        info!(
            status = %status,
            succeeded = summary.succeeded_count(),
            failed = summary.failed_count(),
            "Demo stage finished"
        );
        for record in &summary.records {
            info!(
                status = %Status::from_success(record.succeeded),
                demo = %record.description,
                attempts = record.attempts,
                "Demo result"
            );
        }
        summary
    }
}
