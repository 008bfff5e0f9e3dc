//! Lyra Boot - container entrypoint
//!
//! The `lyra-boot` command runs as the container's entrypoint. Everything
//! after its own options is classified by the dispatcher:
//!
//! - no arguments: bootstrap, then keep the container alive
//! - `-i` / `--interactive`: bootstrap, then start a shell
//! - `bash ...`, `python ...`: exec immediately, skipping the bootstrap
//! - any other command: bootstrap, then exec it
//! - `-h` / `--help`: print usage

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use lyra_boot_core::config::CONFIG_PATH_ENV;
use lyra_boot_core::{handoff, BootConfig, Dispatcher, SystemRunner};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "lyra-boot")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bootstrap orchestrator for the Lyra container", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Emit JSON-formatted log lines
    #[arg(
        long = "boot-log-json",
        env = "LYRA_BOOT_LOG_JSON",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    log_json: bool,

    /// Enable debug logging
    #[arg(
        long = "boot-verbose",
        env = "LYRA_BOOT_VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    verbose: bool,

    /// TOML configuration file
    #[arg(long = "boot-config", env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Mode flags and command, passed verbatim to the dispatcher. Boot
    /// options after the first of these are not recognised.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    lyra_boot_core::init_tracing(cli.log_json, level);

    let config = BootConfig::load(cli.config.as_deref())
        .context("Failed to load boot configuration")?;
    let report_path = config.report_path.clone();

    let dispatcher = Dispatcher::new(config, Arc::new(SystemRunner));
    let outcome = dispatcher.dispatch(&cli.args).await;

    if let (Some(path), Some(report)) = (report_path, outcome.report.as_ref()) {
        match report.write(&path) {
            Ok(_) => info!(path = %path.display(), "Wrote boot report"),
            Err(e) => warn!(status = "warn", path = %path.display(), error = %e, "Could not write boot report"),
        }
    }

    let code = handoff::perform(outcome.terminal)
        .await
        .context("Hand-off failed")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["lyra-boot"]).expect("parse");
        assert!(cli.args.is_empty());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_mode_flags_pass_through() {
        let cli = Cli::try_parse_from(["lyra-boot", "-i"]).expect("parse");
        assert_eq!(cli.args, vec!["-i"]);

        let cli = Cli::try_parse_from(["lyra-boot", "-h"]).expect("parse");
        assert_eq!(cli.args, vec!["-h"]);
    }

    // The only test that sets the boolean env vars.
    #[test]
    fn test_boolean_env_values() {
        for (raw, expected) in [
            ("1", true),
            ("true", true),
            ("yes", true),
            ("0", false),
            ("false", false),
            ("off", false),
            ("", false),
        ] {
            std::env::set_var("LYRA_BOOT_LOG_JSON", raw);
            std::env::set_var("LYRA_BOOT_VERBOSE", raw);
            let parsed = Cli::try_parse_from(["lyra-boot", "-i"]);
            std::env::remove_var("LYRA_BOOT_LOG_JSON");
            std::env::remove_var("LYRA_BOOT_VERBOSE");

            let cli = parsed.unwrap_or_else(|e| panic!("{raw:?} rejected: {e}"));
            assert_eq!(cli.log_json, expected, "LYRA_BOOT_LOG_JSON={raw:?}");
            assert_eq!(cli.verbose, expected, "LYRA_BOOT_VERBOSE={raw:?}");
            assert_eq!(cli.args, vec!["-i"]);
        }
    }

    #[test]
    fn test_boot_options_before_mode_flags() {
        let cli = Cli::try_parse_from(["lyra-boot", "--boot-verbose", "--boot-log-json", "-i"])
            .expect("parse");
        assert!(cli.verbose);
        assert!(cli.log_json);
        assert_eq!(cli.args, vec!["-i"]);

        let cli = Cli::try_parse_from(["lyra-boot", "-i", "--boot-verbose"]).expect("parse");
        assert_eq!(cli.args, vec!["-i", "--boot-verbose"]);
    }

    #[test]
    fn test_trailing_command_keeps_its_flags() {
        let cli = Cli::try_parse_from(["lyra-boot", "nvidia-smi", "-L"]).expect("parse");
        assert_eq!(cli.args, vec!["nvidia-smi", "-L"]);
    }
}
