//! Top-level bootstrap state machine.
//!
//! Arguments are classified once into a [`DispatchMode`]; the dispatcher then
//! either hands off immediately or runs the health check, optional repair,
//! provisioning and demo stages before choosing a [`Terminal`] transition.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::command::CommandSpec;
use crate::config::BootConfig;
use crate::demo::DemoStage;
use crate::error::FailureKind;
use crate::health::HealthChecker;
use crate::provision::ProvisionStage;
use crate::repair::RepairAttempt;
use crate::report::BootReport;
use crate::retry::RetryExecutor;
use crate::runner::ProcessRunner;
use crate::telemetry::Status;

/// How this process will spend its life, derived once from its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "args")]
pub enum DispatchMode {
    ShowHelp,
    DirectExec(Vec<String>),
    RunPipelineThenInteractive,
    RunPipelineThenExec(Vec<String>),
    RunPipelineThenKeepAlive,
}

impl DispatchMode {
    /// Classify process arguments (without argv\[0]).
    ///
    /// Leading `-h/--help` and `-i/--interactive` flags are consumed; the
    /// first remaining argument starts the user command. First match wins,
    /// in this order: help flag, direct-exec command name, interactive flag,
    /// any trailing command, nothing.
    pub fn classify(args: &[String], config: &BootConfig) -> Self {
        let flags = args
            .iter()
            .take_while(|a| matches!(a.as_str(), "-h" | "--help" | "-i" | "--interactive"))
            .count();
        let (leading, rest) = args.split_at(flags);
        let help = leading.iter().any(|a| a == "-h" || a == "--help");
        let interactive = leading.iter().any(|a| a == "-i" || a == "--interactive");

        match (help, rest, interactive) {
            (true, _, _) => DispatchMode::ShowHelp,
            (false, [program, ..], _) if config.is_direct_exec(program) => {
                DispatchMode::DirectExec(rest.to_vec())
            }
            (false, _, true) => DispatchMode::RunPipelineThenInteractive,
            (false, [_, ..], false) => DispatchMode::RunPipelineThenExec(rest.to_vec()),
            (false, [], false) => DispatchMode::RunPipelineThenKeepAlive,
        }
    }

    pub fn runs_pipeline(&self) -> bool {
        !matches!(self, DispatchMode::ShowHelp | DispatchMode::DirectExec(_))
    }
}

/// Final transition of the orchestrator, performed by the outermost runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Print the text and exit 0.
    Usage(String),
    /// Replace the process image with this command.
    ReplaceWith(CommandSpec),
    /// Idle until an external signal arrives.
    KeepAlive,
}

/// Result of a dispatch: the terminal transition plus the pipeline report,
/// when the pipeline ran.
#[derive(Debug, Clone)]
pub struct BootOutcome {
    pub mode: DispatchMode,
    pub terminal: Terminal,
    pub report: Option<BootReport>,
}

/// Drives the bootstrap pipeline for one configuration.
pub struct Dispatcher {
    config: BootConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl Dispatcher {
    pub fn new(config: BootConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    pub fn classify(&self, args: &[String]) -> DispatchMode {
        DispatchMode::classify(args, &self.config)
    }

    pub async fn dispatch(&self, args: &[String]) -> BootOutcome {
        let mode = self.classify(args);
        info!(?mode, "Dispatching");

        let report = if mode.runs_pipeline() {
            Some(self.run_pipeline(mode.clone()).await)
        } else {
            None
        };
        let terminal = self.terminal(&mode);

        BootOutcome {
            mode,
            terminal,
            report,
        }
    }

    /// Health check, optional repair, provisioning and demos.
    ///
    /// Provisioning and demos are skipped when the runtime is still
    /// unavailable after the repair attempt.
    pub async fn run_pipeline(&self, mode: DispatchMode) -> BootReport {
        let mut report = BootReport::start(mode);
        let catalog = Catalog::new(&self.config);
        let checker = HealthChecker::new(self.runner.clone(), catalog.health_probe());

        info!(run_id = %report.run_id, "Starting bootstrap pipeline");

        let health = checker.check().await;
        let healthy = health.runtime_available;
        report.initial_health = Some(health);

        if !healthy {
            let repair = RepairAttempt::new(
                self.runner.clone(),
                catalog.repair_commands(),
                checker.clone(),
            );
            let outcome = repair.run().await;
            let recovered = outcome.recovered();
            report.repair = Some(outcome);

            if !recovered {
                report.degraded = Some(FailureKind::RuntimeUnavailable);
                report.finish();
                error!(
                    status = %Status::Fail,
                    hint = "rebuild the image without cache (docker build --no-cache .) and check the CUDA driver",
                    "Runtime still unavailable after reinstall; skipping downloads and demos"
                );
                return report;
            }
        }

        let executor = RetryExecutor::new(self.runner.clone(), self.config.retry.clone());

        info!("Provisioning checkpoints and demo assets");
        report.provisioning = ProvisionStage::new(executor.clone(), catalog.provision_targets())
            .run()
            .await;

        info!("Running demo workloads");
        report.demos = Some(DemoStage::new(executor, catalog.demo_targets()).run().await);

        report.finish();
        info!(run_id = %report.run_id, status = %Status::Ok, "Bootstrap pipeline finished");
        report
    }

    /// Terminal transition selected by the original arguments.
    ///
    /// Direct-exec commands run in `app_dir` without the workload variables.
    fn terminal(&self, mode: &DispatchMode) -> Terminal {
        let catalog = Catalog::new(&self.config);
        match mode {
            DispatchMode::ShowHelp => Terminal::Usage(usage(&self.config)),
            DispatchMode::DirectExec(argv) => match CommandSpec::from_argv(argv) {
                Some(command) => Terminal::ReplaceWith(command.current_dir(&self.config.app_dir)),
                None => Terminal::KeepAlive,
            },
            DispatchMode::RunPipelineThenInteractive => {
                Terminal::ReplaceWith(catalog.interactive_shell().envs(self.config.workload_env()))
            }
            DispatchMode::RunPipelineThenExec(argv) => match CommandSpec::from_argv(argv) {
                Some(command) => Terminal::ReplaceWith(
                    command
                        .current_dir(&self.config.app_dir)
                        .envs(self.config.workload_env()),
                ),
                None => {
                    warn!("Empty command, keeping container alive instead");
                    Terminal::KeepAlive
                }
            },
            DispatchMode::RunPipelineThenKeepAlive => Terminal::KeepAlive,
        }
    }
}

/// Usage text printed for `-h/--help`.
pub fn usage(config: &BootConfig) -> String {
    format!(
        "\
Usage: lyra-boot [OPTIONS] [COMMAND [ARGS...]]

Bootstraps the Lyra container: checks the ML runtime (reinstalling
dependencies once if it is missing), downloads checkpoints and demo assets
when absent, runs the demo workloads, then hands off.

Modes:
  (no arguments)        run the pipeline, then keep the container alive
  -i, --interactive     run the pipeline, then start {shell}
  COMMAND [ARGS...]     run the pipeline, then exec COMMAND
  {direct} ...
                        exec immediately, skipping the pipeline
  -h, --help            show this help

Options (must come before the mode flags and COMMAND; anything after the
first mode flag or command word is passed through untouched):
  --boot-config PATH    TOML configuration file
  --boot-log-json       emit JSON log lines
  --boot-verbose        enable debug logging

Environment:
  LYRA_BOOT_CONFIG        TOML configuration file
  LYRA_BOOT_APP_DIR       application directory (current: {app_dir})
  LYRA_BOOT_MAX_ATTEMPTS  attempts per download/demo (current: {attempts})
  LYRA_BOOT_BACKOFF_SECS  seconds between attempts (current: {backoff})
  LYRA_BOOT_REPORT        write a JSON boot report to this path
  LYRA_BOOT_LOG_JSON      emit JSON log lines (0, false, no, off: disabled)
  LYRA_BOOT_VERBOSE       enable debug logging (0, false, no, off: disabled)
  RUST_LOG                log filter

Downloads are skipped when these directories are non-empty:
  {checkpoints}
  {demo}
",
        shell = config.shell,
        direct = config.direct_exec_commands.join(" | "),
        app_dir = config.app_dir.display(),
        attempts = config.retry.max_attempts,
        backoff = config.retry.backoff_secs,
        checkpoints = config.checkpoints_path().display(),
        demo = config.demo_assets_path().display(),
    )
}
