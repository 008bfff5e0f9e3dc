//! Boot configuration.
//!
//! Resolved once at startup (defaults, then an optional TOML file, then
//! `LYRA_BOOT_*` environment overrides) and passed by reference into every
//! stage. Nothing mutates it afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BootError, Result};
use crate::retry::RetryPolicy;

/// Device-selection variable exported to provisioning and demo commands.
pub const DEVICE_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// Module search-path variable exported to provisioning and demo commands.
pub const MODULE_PATH_ENV: &str = "PYTHONPATH";

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "LYRA_BOOT_CONFIG";

const APP_DIR_ENV: &str = "LYRA_BOOT_APP_DIR";
const MAX_ATTEMPTS_ENV: &str = "LYRA_BOOT_MAX_ATTEMPTS";
const BACKOFF_SECS_ENV: &str = "LYRA_BOOT_BACKOFF_SECS";
const REPORT_PATH_ENV: &str = "LYRA_BOOT_REPORT";

/// Immutable configuration shared by all stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Application working directory; every command runs here.
    pub app_dir: PathBuf,

    /// Checkpoint directory gating all three checkpoint downloads.
    pub checkpoints_dir: PathBuf,

    /// Demo dataset directory gating the dataset pull.
    pub demo_assets_dir: PathBuf,

    /// Retry bounds for downloads and demo workloads.
    pub retry: RetryPolicy,

    /// Value exported as `CUDA_VISIBLE_DEVICES`.
    pub device: String,

    /// Value exported as `PYTHONPATH`; defaults to `app_dir`.
    pub python_path: Option<PathBuf>,

    /// Python interpreter used for the probe, downloads and demos.
    pub python: String,

    /// Interactive shell.
    pub shell: String,

    /// First arguments that bypass the pipeline and are exec'd directly.
    pub direct_exec_commands: Vec<String>,

    /// Where to write the JSON boot report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            app_dir: PathBuf::from("/workspace/lyra"),
            checkpoints_dir: PathBuf::from("checkpoints"),
            demo_assets_dir: PathBuf::from("assets/demo"),
            retry: RetryPolicy::default(),
            device: "0".to_string(),
            python_path: None,
            python: "python".to_string(),
            shell: "/bin/bash".to_string(),
            direct_exec_commands: ["bash", "sh", "python", "python3"]
                .into_iter()
                .map(String::from)
                .collect(),
            report_path: None,
        }
    }
}

impl BootConfig {
    /// Load configuration from an optional TOML file plus process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        debug!(?config, "Resolved boot configuration");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|source| BootError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `LYRA_BOOT_*` overrides using `lookup` to read variables.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(APP_DIR_ENV) {
            self.app_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(MAX_ATTEMPTS_ENV) {
            self.retry.max_attempts = parse_env(MAX_ATTEMPTS_ENV, &raw)?;
        }
        if let Some(raw) = lookup(BACKOFF_SECS_ENV) {
            self.retry.backoff_secs = parse_env(BACKOFF_SECS_ENV, &raw)?;
        }
        if let Some(path) = lookup(REPORT_PATH_ENV) {
            self.report_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(BootError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.shell.trim().is_empty() {
            return Err(BootError::InvalidConfig("shell must not be empty".to_string()));
        }
        if self.python.trim().is_empty() {
            return Err(BootError::InvalidConfig("python must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve `path` against `app_dir` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_dir.join(path)
        }
    }

    pub fn checkpoints_path(&self) -> PathBuf {
        self.resolve(&self.checkpoints_dir)
    }

    pub fn demo_assets_path(&self) -> PathBuf {
        self.resolve(&self.demo_assets_dir)
    }

    /// Variables exported to every provisioning, demo and hand-off command.
    pub fn workload_env(&self) -> Vec<(String, String)> {
        let python_path = self.python_path.as_deref().unwrap_or(&self.app_dir);
        vec![
            (DEVICE_ENV.to_string(), self.device.clone()),
            (
                MODULE_PATH_ENV.to_string(),
                python_path.to_string_lossy().to_string(),
            ),
        ]
    }

    pub fn is_direct_exec(&self, program: &str) -> bool {
        self.direct_exec_commands.iter().any(|c| c == program)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| BootError::InvalidEnv {
        var: var.to_string(),
        value: raw.to_string(),
    })
}
