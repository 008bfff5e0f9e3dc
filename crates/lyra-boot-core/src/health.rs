//! Runtime health probe.
//!
//! The probe is an external Python command printing `key=value` lines:
//!
//! ```text
//! runtime=ok
//! runtime_version=2.6.0
//! acceleration=NVIDIA A100-SXM4-80GB
//! module:torchvision=ok
//! module:flash_attn=missing
//! ```
//!
//! Checking is pure observation; nothing is installed or modified here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::command::CommandSpec;
use crate::runner::{CapturedOutput, ProcessRunner};
use crate::telemetry::Status;

/// How a missing dependency module affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleRole {
    /// Workloads need it; reported as a failure.
    Required,
    /// A slower fallback exists; reported as a warning.
    Optional,
}

/// Dependency modules reported by the probe, in report order.
pub const DEPENDENCY_MODULES: &[(&str, ModuleRole)] = &[
    ("torchvision", ModuleRole::Required),
    ("transformers", ModuleRole::Required),
    ("diffusers", ModuleRole::Required),
    ("accelerate", ModuleRole::Required),
    ("einops", ModuleRole::Required),
    ("imageio", ModuleRole::Required),
    ("flash_attn", ModuleRole::Optional),
];

/// Trailing stderr lines kept from a probe that did not exit 0.
const STDERR_TAIL_LINES: usize = 5;

/// One human-readable probe finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub status: Status,
    pub message: String,
}

impl Diagnostic {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Core numerical runtime importable.
    pub runtime_available: bool,

    /// Hardware acceleration detected.
    pub acceleration_available: bool,

    /// Accelerator name when one was detected.
    pub accelerator: Option<String>,

    /// Required modules that failed to import.
    pub missing_modules: Vec<String>,

    /// Findings in probe order.
    pub diagnostics: Vec<Diagnostic>,
}

impl HealthStatus {
    /// Interpret captured probe output.
    ///
    /// A probe that did not exit 0 never reports the runtime as available,
    /// whatever it printed.
    pub fn from_probe(output: &CapturedOutput) -> Self {
        let mut status = HealthStatus {
            runtime_available: false,
            acceleration_available: false,
            accelerator: None,
            missing_modules: Vec::new(),
            diagnostics: Vec::new(),
        };
        let mut runtime_version = None;
        let mut runtime_error = None;
        let mut runtime_reported = false;

        for line in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((key, value)) = line.split_once('=') else {
                status.diagnostics.push(Diagnostic::new(Status::Warn, line));
                continue;
            };

            match key {
                "runtime" => {
                    runtime_reported = true;
                    status.runtime_available = value == "ok";
                }
                "runtime_version" => runtime_version = Some(value.to_string()),
                "error" => runtime_error = Some(value.to_string()),
                "acceleration" => {
                    if value != "none" && !value.is_empty() {
                        status.acceleration_available = true;
                        status.accelerator = Some(value.to_string());
                    }
                }
                _ => match key.strip_prefix("module:") {
                    Some(module) => status.record_module(module, value == "ok"),
                    None => status.diagnostics.push(Diagnostic::new(Status::Warn, line)),
                },
            }
        }

        if !output.result.succeeded {
            status.runtime_available = false;
            let message = if output.result.is_spawn_failure() {
                "runtime probe could not be started".to_string()
            } else {
                format!("runtime probe exited with code {}", output.result.exit_code)
            };
            status.diagnostics.insert(0, Diagnostic::new(Status::Fail, message));

            let stderr: Vec<&str> = output
                .stderr
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.trim().is_empty())
                .collect();
            let tail = &stderr[stderr.len().saturating_sub(STDERR_TAIL_LINES)..];
            status.diagnostics.extend(
                tail.iter()
                    .map(|line| Diagnostic::new(Status::Fail, format!("probe stderr: {}", line))),
            );
        }

        let runtime_line = match (status.runtime_available, runtime_version, runtime_error) {
            (true, Some(version), _) => {
                Diagnostic::new(Status::Ok, format!("runtime: torch {} importable", version))
            }
            (true, None, _) => Diagnostic::new(Status::Ok, "runtime: torch importable"),
            (false, _, Some(err)) => {
                Diagnostic::new(Status::Fail, format!("runtime: torch not importable ({})", err))
            }
            (false, _, None) if runtime_reported => {
                Diagnostic::new(Status::Fail, "runtime: torch not importable")
            }
            (false, _, None) => Diagnostic::new(Status::Fail, "runtime: probe reported nothing"),
        };
        let acceleration_line = match &status.accelerator {
            Some(device) => Diagnostic::new(Status::Ok, format!("acceleration: {}", device)),
            None => Diagnostic::new(
                Status::Warn,
                "acceleration: none detected, workloads will run on CPU",
            ),
        };
        let offset = usize::from(!output.result.succeeded);
        status.diagnostics.insert(offset, runtime_line);
        status.diagnostics.insert(offset + 1, acceleration_line);

        status
    }

    fn record_module(&mut self, module: &str, ok: bool) {
        let role = DEPENDENCY_MODULES
            .iter()
            .find(|(name, _)| *name == module)
            .map(|(_, role)| *role)
            .unwrap_or(ModuleRole::Required);

        let diagnostic = match (ok, role) {
            (true, _) => Diagnostic::new(Status::Ok, format!("module {}: ok", module)),
            (false, ModuleRole::Optional) => Diagnostic::new(
                Status::Warn,
                format!("module {}: missing, CPU attention fallback will be used", module),
            ),
            (false, ModuleRole::Required) => {
                self.missing_modules.push(module.to_string());
                Diagnostic::new(Status::Fail, format!("module {}: missing", module))
            }
        };
        self.diagnostics.push(diagnostic);
    }

    /// Diagnostic lines in order.
    pub fn diagnostic_messages(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.message.as_str()).collect()
    }
}

/// Runs the diagnostic probe and reports a [`HealthStatus`].
#[derive(Clone)]
pub struct HealthChecker {
    runner: Arc<dyn ProcessRunner>,
    probe: CommandSpec,
}

impl HealthChecker {
    pub fn new(runner: Arc<dyn ProcessRunner>, probe: CommandSpec) -> Self {
        Self { runner, probe }
    }

    pub async fn check(&self) -> HealthStatus {
        info!("Checking runtime health");
        let output = self.runner.capture(&self.probe).await;
        let health = HealthStatus::from_probe(&output);

        for diagnostic in &health.diagnostics {
            match diagnostic.status {
                Status::Ok => info!(status = %diagnostic.status, "{}", diagnostic.message),
                Status::Warn => warn!(status = %diagnostic.status, "{}", diagnostic.message),
                Status::Fail => error!(status = %diagnostic.status, "{}", diagnostic.message),
            }
        }
        health
    }
}
