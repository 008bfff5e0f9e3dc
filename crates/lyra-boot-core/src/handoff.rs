//! Terminal transitions: usage output, process replacement, keep-alive.

use tracing::{info, warn};

use crate::command::CommandSpec;
use crate::dispatch::Terminal;
use crate::error::{BootError, Result};

/// Carry out `terminal` and return the exit code the process should end with.
///
/// On Unix a successful [`Terminal::ReplaceWith`] never returns.
pub async fn perform(terminal: Terminal) -> Result<i32> {
    match terminal {
        Terminal::Usage(text) => {
            print!("{}", text);
            Ok(0)
        }
        Terminal::ReplaceWith(command) => replace_process(&command),
        Terminal::KeepAlive => {
            keep_alive().await?;
            Ok(0)
        }
    }
}

/// Replace the current process image with `command`.
#[cfg(unix)]
pub fn replace_process(command: &CommandSpec) -> Result<i32> {
    use std::os::unix::process::CommandExt;

    info!(command = %command, "Handing off");
    let err = build(command).exec();
    Err(BootError::Exec {
        program: command.program.clone(),
        source: err,
    })
}

/// Spawn `command`, wait for it and forward its exit code.
#[cfg(not(unix))]
pub fn replace_process(command: &CommandSpec) -> Result<i32> {
    info!(command = %command, "Handing off (spawn and wait)");
    let status = build(command).status().map_err(|source| BootError::Exec {
        program: command.program.clone(),
        source,
    })?;
    Ok(crate::runner::exit_code_of(status))
}

fn build(command: &CommandSpec) -> std::process::Command {
    let mut cmd = std::process::Command::new(&command.program);
    cmd.args(&command.args).envs(&command.env);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

/// Hold the process open until SIGINT or SIGTERM.
pub async fn keep_alive() -> Result<()> {
    info!("Keeping container alive; send SIGTERM or Ctrl-C to stop");
    wait_for_shutdown().await?;
    warn!("Termination signal received, exiting");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).map_err(BootError::Signal)?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map_err(BootError::Signal),
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await.map_err(BootError::Signal)
}
