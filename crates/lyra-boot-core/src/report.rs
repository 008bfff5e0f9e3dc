//! Boot report artifact.
//!
//! Written as `<path>` (pretty JSON) plus `<path>.sha256` holding the hex
//! SHA-256 digest of the JSON bytes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::demo::DemoSummary;
use crate::dispatch::DispatchMode;
use crate::error::{FailureKind, Result};
use crate::health::HealthStatus;
use crate::provision::ProvisionRecord;
use crate::repair::RepairOutcome;

/// Everything one pipeline run observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootReport {
    pub run_id: Uuid,
    pub mode: DispatchMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub initial_health: Option<HealthStatus>,
    pub repair: Option<RepairOutcome>,
    /// Set when provisioning and demos were skipped, naming why.
    pub degraded: Option<FailureKind>,
    pub provisioning: Vec<ProvisionRecord>,
    pub demos: Option<DemoSummary>,
}

impl BootReport {
    pub fn start(mode: DispatchMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            initial_health: None,
            repair: None,
            degraded: None,
            provisioning: Vec::new(),
            demos: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Health the pipeline acted on: post-repair if a repair ran.
    pub fn final_health(&self) -> Option<&HealthStatus> {
        self.repair
            .as_ref()
            .map(|r| &r.health)
            .or(self.initial_health.as_ref())
    }

    /// Persist the report and its digest sidecar. Returns the sidecar path.
    pub fn write(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        let digest = hex::encode(Sha256::digest(&json));

        let mut digest_path = path.as_os_str().to_owned();
        digest_path.push(".sha256");
        let digest_path = PathBuf::from(digest_path);

        std::fs::write(path, &json)?;
        std::fs::write(&digest_path, digest.as_bytes())?;
        Ok(digest_path)
    }
}
