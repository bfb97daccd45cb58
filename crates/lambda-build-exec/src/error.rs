use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start shell for `{command}`")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Hard failure. `output` is the command's standard output, which may be
    /// empty; diagnostics went to the log at error level.
    #[error("command failed ({}): {command}\n{output}", exit_label(*code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("container engine `{binary}` not found or not executable")]
    NotFound {
        binary: String,
        source: std::io::Error,
    },

    #[error("container engine command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("failed to prepare local directory {path}")]
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read output of `{command}` in container {container}")]
    Stream {
        container: String,
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed in container {container} ({})", exit_label(*code))]
    ExecFailed {
        container: String,
        command: String,
        code: Option<i32>,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_owned(),
    }
}
