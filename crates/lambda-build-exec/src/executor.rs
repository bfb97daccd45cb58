use std::path::Path;
use std::process::{Command, Stdio};

use lambda_build_core::ShellIdiom;

use crate::error::ExecError;

/// Captured result of one shell invocation, before any exit-code policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Abstraction over running a shell command string for testability.
///
/// Production code uses [`SystemShell`], tests use mockall-generated mocks.
pub trait ShellExecutor {
    /// Run `command` through the shell in `cwd`, blocking until it exits.
    fn execute(&self, command: &str, cwd: &Path) -> Result<RawOutput, ExecError>;
}

/// Runs commands through the host shell (`sh -c` or `cmd /C`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell {
    idiom: ShellIdiom,
}

impl SystemShell {
    pub fn new(idiom: ShellIdiom) -> Self {
        Self { idiom }
    }
}

impl ShellExecutor for SystemShell {
    fn execute(&self, command: &str, cwd: &Path) -> Result<RawOutput, ExecError> {
        let output = Command::new(self.idiom.program)
            .arg(self.idiom.command_flag)
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ExecError::Spawn {
                command: command.to_owned(),
                source: e,
            })?;

        Ok(RawOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
