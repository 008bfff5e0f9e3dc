//! Lyra Boot Core - container bootstrap orchestration
//!
//! Runs when the Lyra container starts:
//! - probes the ML runtime and reinstalls dependencies once if it is missing
//! - downloads checkpoints and the demo dataset unless already present
//! - runs the static and dynamic scene demos with bounded retries
//! - hands off to a shell, a user command, or a keep-alive wait
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lyra_boot_core::{handoff, BootConfig, Dispatcher, SystemRunner};
//!
//! # async fn boot() -> lyra_boot_core::Result<i32> {
//! let config = BootConfig::load(None)?;
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let outcome = Dispatcher::new(config, Arc::new(SystemRunner)).dispatch(&args).await;
//! handoff::perform(outcome.terminal).await
//! # }
//! ```

pub mod catalog;
pub mod command;
pub mod config;
pub mod demo;
pub mod dispatch;
pub mod error;
pub mod fakes;
pub mod handoff;
pub mod health;
pub mod probe;
pub mod provision;
pub mod repair;
pub mod report;
pub mod retry;
pub mod runner;
pub mod telemetry;

// Re-export key types
pub use catalog::{Catalog, DemoTarget, ProvisionTarget};
pub use command::CommandSpec;
pub use config::BootConfig;
pub use demo::{DemoRecord, DemoStage, DemoSummary};
pub use dispatch::{BootOutcome, DispatchMode, Dispatcher, Terminal};
pub use error::{BootError, FailureKind, Result};
pub use health::{HealthChecker, HealthStatus};
pub use probe::is_populated;
pub use provision::{ProvisionOutcome, ProvisionRecord, ProvisionStage};
pub use repair::{RepairAttempt, RepairOutcome};
pub use report::BootReport;
pub use retry::{RetryExecutor, RetryPolicy};
pub use runner::{AttemptResult, CapturedOutput, ProcessRunner, SystemRunner};
pub use telemetry::{init_tracing, Status};
