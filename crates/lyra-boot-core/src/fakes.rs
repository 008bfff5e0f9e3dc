//! In-memory fakes for the process seam (testing only)
//!
//! `ScriptedRunner` replays scripted exit codes and output instead of spawning
//! processes, and records every invocation in order.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::CommandSpec;
use crate::runner::{AttemptResult, CapturedOutput, ProcessRunner};

#[derive(Debug)]
struct Script {
    /// Substring matched against the rendered command line.
    pattern: String,
    exit_codes: VecDeque<i32>,
    stdout: Option<String>,
    stderr: Option<String>,
    missing: bool,
}

impl Script {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            exit_codes: VecDeque::new(),
            stdout: None,
            stderr: None,
            missing: false,
        }
    }
}

/// Scripted [`ProcessRunner`].
///
/// A command is matched against the scripts in registration order by
/// substring of its rendered command line. Scripted exit codes are consumed
/// one per invocation; once exhausted (or when nothing matches) the command
/// exits 0 with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<Vec<Script>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, pattern: &str, edit: impl FnOnce(&mut Script)) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.iter_mut().find(|s| s.pattern == pattern) {
                Some(script) => edit(script),
                None => {
                    let mut script = Script::new(pattern);
                    edit(&mut script);
                    scripts.push(script);
                }
            }
        }
        self
    }

    /// Exit codes returned, in order, by commands matching `pattern`.
    pub fn with_exit_codes(self, pattern: &str, codes: impl IntoIterator<Item = i32>) -> Self {
        self.script(pattern, |s| s.exit_codes.extend(codes))
    }

    /// Commands matching `pattern` always fail.
    pub fn always_failing(self, pattern: &str) -> Self {
        self.with_exit_codes(pattern, std::iter::repeat(1).take(64))
    }

    /// Stdout produced by every captured command matching `pattern`.
    pub fn with_stdout(self, pattern: &str, stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        self.script(pattern, |s| s.stdout = Some(stdout))
    }

    /// Stderr produced by every captured command matching `pattern`.
    pub fn with_stderr(self, pattern: &str, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        self.script(pattern, |s| s.stderr = Some(stderr))
    }

    /// Commands matching `pattern` cannot be spawned.
    pub fn with_missing_program(self, pattern: &str) -> Self {
        self.script(pattern, |s| s.missing = true)
    }

    /// Every invocation so far, in order.
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().unwrap().clone()
    }

    /// Rendered command lines of every invocation so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }

    /// Number of invocations whose command line contains `pattern`.
    pub fn invocation_count(&self, pattern: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|c| c.to_string().contains(pattern))
            .count()
    }

    fn next(&self, command: &CommandSpec) -> CapturedOutput {
        self.invocations.lock().unwrap().push(command.clone());

        let line = command.to_string();
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.iter_mut().find(|s| line.contains(&s.pattern)) else {
            return silent(AttemptResult::from_exit_code(0));
        };

        if script.missing {
            return silent(AttemptResult::spawn_failure());
        }
        let code = script.exit_codes.pop_front().unwrap_or(0);
        CapturedOutput {
            result: AttemptResult::from_exit_code(code),
            stdout: script.stdout.clone().unwrap_or_default(),
            stderr: script.stderr.clone().unwrap_or_default(),
        }
    }
}

fn silent(result: AttemptResult) -> CapturedOutput {
    CapturedOutput {
        result,
        stdout: String::new(),
        stderr: String::new(),
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> AttemptResult {
        self.next(command).result
    }

    async fn capture(&self, command: &CommandSpec) -> CapturedOutput {
        self.next(command)
    }
}
