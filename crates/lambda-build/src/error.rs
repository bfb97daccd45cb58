use std::path::PathBuf;

use lambda_build_exec::{EngineError, ExecError};

use crate::archive::ArchiveError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An export or install command failed. `output` is what the command
    /// wrote to standard output (for container installs, the last lines of
    /// the stream) and may be empty.
    #[error("command failed: {command}\n{output}")]
    CommandExecution { command: String, output: String },

    #[error("failed to start command")]
    Spawn { source: ExecError },

    #[error("container operation failed")]
    ContainerIo {
        #[from]
        source: EngineError,
    },

    #[error("failed to build artifact {target}")]
    Packaging {
        target: PathBuf,
        source: ArchiveError,
    },

    #[error("failed to prepare working directory {path}")]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] lambda_build_core::Error),
}

impl BuildError {
    /// Captured standard output of the failing command, if a command failed.
    pub fn command_output(&self) -> Option<&str> {
        match self {
            BuildError::CommandExecution { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<ExecError> for BuildError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::CommandFailed {
                command, output, ..
            } => BuildError::CommandExecution { command, output },
            spawn @ ExecError::Spawn { .. } => BuildError::Spawn { source: spawn },
        }
    }
}
