//! Error taxonomy for the bootstrap orchestrator.
//!
//! Failures of the external collaborators (spawn failures, unhealthy runtime,
//! exhausted downloads or workloads) are not errors here: they travel as data
//! in [`AttemptResult`](crate::runner::AttemptResult) and the stage outcomes.
//! `BootError` covers what the orchestrator itself cannot recover from.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::runner::AttemptResult;

/// Bootstrap errors.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("invalid boot configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for termination signal: {0}")]
    Signal(std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bootstrap operations.
pub type Result<T> = std::result::Result<T, BootError>;

/// Category of a non-fatal failure, as recorded in the boot report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The command could not be started at all.
    SpawnFailure,
    /// The ML runtime is missing and a reinstall did not bring it back.
    RuntimeUnavailable,
    /// A checkpoint or dataset download exhausted its retries.
    AcquisitionFailure,
    /// A demo workload exhausted its retries.
    WorkloadFailure,
}

impl FailureKind {
    /// Classify a finished invocation. A spawn failure wins over `otherwise`;
    /// a successful result has no category.
    pub fn classify(result: &AttemptResult, otherwise: FailureKind) -> Option<FailureKind> {
        if result.succeeded {
            None
        } else if result.is_spawn_failure() {
            Some(FailureKind::SpawnFailure)
        } else {
            Some(otherwise)
        }
    }
}
