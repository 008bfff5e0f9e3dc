//! Idempotent acquisition of checkpoints and demo assets.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::ProvisionTarget;
use crate::error::FailureKind;
use crate::probe::is_populated;
use crate::retry::RetryExecutor;
use crate::telemetry::Status;

/// What happened to one provisioning target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ProvisionOutcome {
    /// Gate directory was already populated; nothing was run.
    AlreadyPresent,
    /// Acquisition command succeeded.
    Acquired { attempts: u32 },
    /// Retries exhausted. Non-fatal.
    Failed {
        attempts: u32,
        exit_code: i32,
        failure: FailureKind,
    },
}

impl ProvisionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ProvisionOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRecord {
    pub description: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: ProvisionOutcome,
}

/// Walks the provisioning targets in declared order.
///
/// Consecutive targets sharing a gate directory are checked once, before
/// the first of them runs: if the directory is already populated the whole
/// group is skipped together, otherwise every target in the group runs even
/// though an earlier one may have populated the directory.
pub struct ProvisionStage {
    executor: RetryExecutor,
    targets: Vec<ProvisionTarget>,
}

impl ProvisionStage {
    pub fn new(executor: RetryExecutor, targets: Vec<ProvisionTarget>) -> Self {
        Self { executor, targets }
    }

    pub async fn run(&self) -> Vec<ProvisionRecord> {
        let mut records = Vec::with_capacity(self.targets.len());
        let mut gate: Option<(&PathBuf, bool)> = None;

        for target in &self.targets {
            let present = match gate {
                Some((path, present)) if path == &target.path => present,
                _ => {
                    let present = is_populated(&target.path);
                    gate = Some((&target.path, present));
                    present
                }
            };

            let outcome = if present {
                info!(
                    status = %Status::Ok,
                    target = %target.description,
                    path = %target.path.display(),
                    "Already present, skipping download"
                );
                ProvisionOutcome::AlreadyPresent
            } else {
                let result = self
                    .executor
                    .execute(&target.description, &target.acquisition)
                    .await;
                match FailureKind::classify(&result, FailureKind::AcquisitionFailure) {
                    None => ProvisionOutcome::Acquired {
                        attempts: result.attempts,
                    },
                    Some(failure) => {
                        warn!(
                            status = %Status::Fail,
                            target = %target.description,
                            ?failure,
                            hint = "check network access and re-run the download script manually",
                            "Download failed, continuing"
                        );
                        ProvisionOutcome::Failed {
                            attempts: result.attempts,
                            exit_code: result.exit_code,
                            failure,
                        }
                    }
                }
            };

            records.push(ProvisionRecord {
                description: target.description.clone(),
                path: target.path.clone(),
                outcome,
            });
        }

        records
    }
}
