use std::path::Path;

use lambda_build_core::ShellIdiom;

use crate::error::ExecError;
use crate::executor::{RawOutput, ShellExecutor, SystemShell};

/// How an exit status is treated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Exit code 0. Anything on stderr is only a warning.
    Success,
    /// Exit code 1. Stderr is reported as an error, then the run fails.
    Error,
    /// Any other code, or no code at all.
    Failure,
}

impl ExitClass {
    pub fn of(code: Option<i32>) -> Self {
        match code {
            Some(0) => ExitClass::Success,
            Some(1) => ExitClass::Error,
            _ => ExitClass::Failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub class: ExitClass,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<RawOutput> for ExecutionResult {
    fn from(raw: RawOutput) -> Self {
        Self {
            class: ExitClass::of(raw.code),
            code: raw.code,
            stdout: raw.stdout,
            stderr: raw.stderr,
        }
    }
}

/// Runs shell commands and applies the lenient exit-code policy.
///
/// | exit code | stderr           | result                         |
/// |-----------|------------------|--------------------------------|
/// | 0         | logged as warning| `Ok(stdout)`                   |
/// | 1         | logged as error  | `Err(CommandFailed { stdout })`|
/// | other     | not logged       | `Err(CommandFailed { stdout })`|
///
/// The failure payload is standard output, never standard error.
pub struct ProcessRunner<E: ShellExecutor = SystemShell> {
    executor: E,
}

impl ProcessRunner<SystemShell> {
    pub fn new(idiom: ShellIdiom) -> Self {
        Self {
            executor: SystemShell::new(idiom),
        }
    }
}

impl Default for ProcessRunner<SystemShell> {
    fn default() -> Self {
        Self::new(ShellIdiom::host())
    }
}

impl<E: ShellExecutor> ProcessRunner<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// Execute `command` in `cwd` and return its standard output.
    pub fn run(&self, command: &str, cwd: &Path) -> Result<String, ExecError> {
        tracing::debug!("Executing: {command}");

        let result = ExecutionResult::from(self.executor.execute(command, cwd)?);
        let stderr = result.stderr.trim_end();

        match result.class {
            ExitClass::Success => {
                if !stderr.is_empty() {
                    tracing::warn!("{stderr}");
                }
                return Ok(result.stdout);
            }
            ExitClass::Error => {
                if !stderr.is_empty() {
                    tracing::error!("{stderr}");
                }
            }
            ExitClass::Failure => {}
        }

        Err(ExecError::CommandFailed {
            command: command.to_owned(),
            code: result.code,
            output: result.stdout,
        })
    }
}
