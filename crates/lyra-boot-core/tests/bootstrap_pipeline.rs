//! End-to-end bootstrap scenarios against a scripted process runner.

use std::path::Path;
use std::sync::Arc;

use lyra_boot_core::config::{DEVICE_ENV, MODULE_PATH_ENV};
use lyra_boot_core::fakes::ScriptedRunner;
use lyra_boot_core::{
    BootConfig, DispatchMode, Dispatcher, FailureKind, ProvisionOutcome, Terminal,
};

const PROBE: &str = "importlib";
const HEALTHY: &str = "runtime=ok\nruntime_version=2.6.0\nacceleration=NVIDIA L40S\n";
const UNHEALTHY: &str = "runtime=missing\nacceleration=none\nerror=No module named 'torch'\n";

fn config_in(app_dir: &Path) -> BootConfig {
    BootConfig {
        app_dir: app_dir.to_path_buf(),
        ..BootConfig::default()
    }
}

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn populate(dir: &Path) {
    std::fs::create_dir_all(dir).expect("mkdir");
    std::fs::write(dir.join("placeholder"), b"x").expect("write");
}

/// Test: fresh container, everything succeeds first time, no arguments
#[tokio::test(start_paused = true)]
async fn test_fresh_container_full_pipeline_then_keep_alive() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(ScriptedRunner::new().with_stdout(PROBE, HEALTHY));
    let dispatcher = Dispatcher::new(config_in(app.path()), runner.clone());

    let outcome = dispatcher.dispatch(&[]).await;

    assert_eq!(outcome.mode, DispatchMode::RunPipelineThenKeepAlive);
    assert_eq!(outcome.terminal, Terminal::KeepAlive);

    let lines = runner.command_lines();
    assert_eq!(lines.len(), 7, "probe + 4 downloads + 2 demos: {:?}", lines);
    assert!(lines[0].contains(PROBE));
    assert!(lines[1].contains("download_lyra_checkpoints"));
    assert!(lines[2].contains("download_gen3c_checkpoints"));
    assert!(lines[3].contains("download_tokenizer_checkpoints"));
    assert!(lines[4].contains("Lyra-Testing-Example"));
    assert!(lines[5].contains("lyra_static"));
    assert!(lines[6].contains("lyra_dynamic"));

    let report = outcome.report.expect("pipeline report");
    assert!(!report.is_degraded());
    assert!(report.repair.is_none());
    assert_eq!(report.provisioning.len(), 4);
    assert!(report
        .provisioning
        .iter()
        .all(|r| r.outcome == ProvisionOutcome::Acquired { attempts: 1 }));
    let demos = report.demos.expect("demo summary");
    assert!(demos.all_succeeded());
    assert!(demos.records.iter().all(|r| r.attempts == 1));
    assert!(report.finished_at.is_some());
}

/// Test: populated gates are never re-acquired
#[tokio::test(start_paused = true)]
async fn test_provisioned_container_skips_all_downloads() {
    let app = tempfile::tempdir().expect("tempdir");
    populate(&app.path().join("checkpoints"));
    populate(&app.path().join("assets/demo"));

    let runner = Arc::new(ScriptedRunner::new().with_stdout(PROBE, HEALTHY));
    let outcome = Dispatcher::new(config_in(app.path()), runner.clone())
        .dispatch(&[])
        .await;

    assert_eq!(runner.invocation_count("download"), 0);
    assert_eq!(runner.invocation_count("Lyra-Testing-Example"), 0);
    assert_eq!(runner.invocation_count("sample.py"), 2);

    let report = outcome.report.expect("pipeline report");
    assert!(report
        .provisioning
        .iter()
        .all(|r| r.outcome == ProvisionOutcome::AlreadyPresent));
}

/// Test: only the dataset is missing
#[tokio::test(start_paused = true)]
async fn test_checkpoint_gate_independent_of_dataset_gate() {
    let app = tempfile::tempdir().expect("tempdir");
    populate(&app.path().join("checkpoints"));

    let runner = Arc::new(ScriptedRunner::new().with_stdout(PROBE, HEALTHY));
    Dispatcher::new(config_in(app.path()), runner.clone())
        .dispatch(&[])
        .await;

    assert_eq!(runner.invocation_count("_checkpoints"), 0);
    assert_eq!(runner.invocation_count("Lyra-Testing-Example"), 1);
}

/// Test: runtime unavailable before and after repair
#[tokio::test(start_paused = true)]
async fn test_unrecovered_runtime_skips_provisioning_and_demos() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(ScriptedRunner::new().with_stdout(PROBE, UNHEALTHY));
    let dispatcher = Dispatcher::new(config_in(app.path()), runner.clone());

    let outcome = dispatcher.dispatch(&[]).await;

    let lines = runner.command_lines();
    assert_eq!(lines.len(), 4, "probe + 2 reinstalls + probe: {:?}", lines);
    assert!(lines[0].contains(PROBE));
    assert!(lines[1].contains("requirements.txt"));
    assert!(lines[2].contains("requirements_gen3c.txt"));
    assert!(lines[3].contains(PROBE));

    let report = outcome.report.expect("pipeline report");
    assert_eq!(report.degraded, Some(FailureKind::RuntimeUnavailable));
    assert!(report.provisioning.is_empty());
    assert!(report.demos.is_none());
    assert!(!report.final_health().expect("health").runtime_available);
    assert_eq!(outcome.terminal, Terminal::KeepAlive);
}

/// Test: degraded mode still honours the requested hand-off
#[tokio::test(start_paused = true)]
async fn test_degraded_mode_keeps_requested_terminal() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(ScriptedRunner::new().with_stdout(PROBE, UNHEALTHY));
    let config = config_in(app.path());
    let dispatcher = Dispatcher::new(config.clone(), runner.clone());

    let outcome = dispatcher.dispatch(&args(&["-i"])).await;

    match outcome.terminal {
        Terminal::ReplaceWith(command) => {
            assert_eq!(command.program, config.shell);
            assert_eq!(command.working_dir.as_deref(), Some(app.path()));
        }
        other => panic!("expected shell hand-off, got {:?}", other),
    }
    assert_eq!(runner.invocation_count("sample.py"), 0);
}

/// Test: repair succeeds and the pipeline continues
#[tokio::test(start_paused = true)]
async fn test_repaired_runtime_continues_pipeline() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(
        ScriptedRunner::new()
            .with_exit_codes(PROBE, [1])
            .with_stdout(PROBE, HEALTHY),
    );

    let outcome = Dispatcher::new(config_in(app.path()), runner.clone())
        .dispatch(&[])
        .await;

    let report = outcome.report.expect("pipeline report");
    assert!(!report.is_degraded());
    assert!(report.repair.as_ref().expect("repair ran").recovered());
    assert_eq!(runner.invocation_count(PROBE), 2);
    assert_eq!(runner.invocation_count("pip install"), 2);
    assert_eq!(runner.invocation_count("sample.py"), 2);
}

/// Test: failing downloads and demos are retried and never abort the run
#[tokio::test(start_paused = true)]
async fn test_failures_are_retried_and_non_fatal() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(
        ScriptedRunner::new()
            .with_stdout(PROBE, HEALTHY)
            .always_failing("download_gen3c_checkpoints")
            .always_failing("lyra_static"),
    );

    let outcome = Dispatcher::new(config_in(app.path()), runner.clone())
        .dispatch(&args(&["nvidia-smi"]))
        .await;

    assert_eq!(runner.invocation_count("download_gen3c_checkpoints"), 3);
    assert_eq!(runner.invocation_count("download_tokenizer_checkpoints"), 1);
    assert_eq!(runner.invocation_count("lyra_static"), 3);
    assert_eq!(runner.invocation_count("lyra_dynamic"), 1);

    let report = outcome.report.expect("pipeline report");
    assert_eq!(
        report.provisioning[1].outcome,
        ProvisionOutcome::Failed {
            attempts: 3,
            exit_code: 1,
            failure: FailureKind::AcquisitionFailure,
        }
    );
    let demos = report.demos.expect("demo summary");
    assert_eq!(demos.failed_count(), 1);
    assert_eq!(demos.succeeded_count(), 1);
    assert_eq!(demos.records[0].failure, Some(FailureKind::WorkloadFailure));

    match outcome.terminal {
        Terminal::ReplaceWith(command) => {
            assert_eq!(command.program, "nvidia-smi");
            assert_eq!(command.env.get(DEVICE_ENV).map(String::as_str), Some("0"));
            assert!(command.env.contains_key(MODULE_PATH_ENV));
        }
        other => panic!("expected exec hand-off, got {:?}", other),
    }
}

/// Test: direct exec and help bypass the pipeline entirely
#[tokio::test]
async fn test_direct_exec_and_help_skip_pipeline() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(ScriptedRunner::new());
    let dispatcher = Dispatcher::new(config_in(app.path()), runner.clone());

    let outcome = dispatcher.dispatch(&args(&["bash", "-lc", "ls"])).await;
    assert_eq!(outcome.mode, DispatchMode::DirectExec(args(&["bash", "-lc", "ls"])));
    assert!(outcome.report.is_none());
    match outcome.terminal {
        Terminal::ReplaceWith(command) => {
            assert_eq!(command.argv(), args(&["bash", "-lc", "ls"]));
            assert_eq!(command.working_dir.as_deref(), Some(app.path()));
        }
        other => panic!("expected direct exec, got {:?}", other),
    }

    let outcome = dispatcher.dispatch(&args(&["--help", "-i"])).await;
    assert_eq!(outcome.mode, DispatchMode::ShowHelp);
    assert!(matches!(outcome.terminal, Terminal::Usage(_)));

    assert!(runner.invocations().is_empty());
}

/// Test: the report written by a run matches what the run observed
#[tokio::test(start_paused = true)]
async fn test_report_written_with_digest() {
    let app = tempfile::tempdir().expect("tempdir");
    let runner = Arc::new(ScriptedRunner::new().with_stdout(PROBE, HEALTHY));
    let outcome = Dispatcher::new(config_in(app.path()), runner)
        .dispatch(&[])
        .await;

    let report = outcome.report.expect("pipeline report");
    let path = app.path().join("boot-report.json");
    let digest_path = report.write(&path).expect("write report");

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("parse");
    assert_eq!(json["mode"]["mode"], "run_pipeline_then_keep_alive");
    assert_eq!(json["provisioning"].as_array().map(Vec::len), Some(4));
    assert!(digest_path.exists());
}
