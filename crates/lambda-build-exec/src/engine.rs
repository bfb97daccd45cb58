use std::fmt;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use lambda_build_core::DockerConfig;

use crate::error::EngineError;

/// Identifier of a running container, as printed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lines produced by a command running in a container, pulled one at a time.
///
/// The final item is an [`EngineError::ExecFailed`] when the command exits
/// unsuccessfully.
pub type OutputLines = Box<dyn Iterator<Item = Result<String, EngineError>> + Send>;

/// Abstraction over the container engine for testability.
///
/// Production code uses [`DockerCli`], tests use mockall-generated mocks.
pub trait ContainerEngine {
    /// Start a detached container that stays alive until destroyed.
    fn create(&self, config: &DockerConfig) -> Result<ContainerId, EngineError>;

    /// Copy a local file to `remote` inside the container.
    fn copy_into(&self, id: &ContainerId, local: &Path, remote: &str) -> Result<(), EngineError>;

    /// Run `command` through `sh -c` inside the container, streaming its output.
    fn exec_streaming(&self, id: &ContainerId, command: &str) -> Result<OutputLines, EngineError>;

    /// Copy the contents of the `remote` directory into the existing `local` directory.
    fn copy_out_of(&self, id: &ContainerId, remote: &str, local: &Path)
    -> Result<(), EngineError>;

    /// Stop and remove the container.
    fn destroy(&self, id: &ContainerId) -> Result<(), EngineError>;
}

/// Docker-compatible CLI engine (`docker`, `podman`, ...).
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Engine named by the docker table, or `docker` without one.
    pub fn from_config(config: Option<&DockerConfig>) -> Self {
        config.map_or_else(Self::new, |c| Self::with_binary(c.engine.as_str()))
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run the engine CLI and capture stdout.
    fn exec(&self, args: &[String]) -> Result<String, EngineError> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| EngineError::NotFound {
                binary: self.binary.clone(),
                source: e,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(EngineError::CommandFailed {
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments of the `run` invocation creating a session container.
pub fn run_args(config: &DockerConfig) -> Vec<String> {
    let mut cmd = vec![
        "run".to_owned(),
        "--detach".to_owned(),
        "--tty".to_owned(),
        "--entrypoint".to_owned(),
        config.entrypoint.clone(),
    ];

    for (key, value) in &config.environment {
        cmd.push("--env".to_owned());
        cmd.push(format!("{key}={value}"));
    }
    for volume in &config.volumes {
        cmd.push("--volume".to_owned());
        cmd.push(volume.clone());
    }

    let optional = [
        ("--network", &config.network),
        ("--platform", &config.platform),
        ("--user", &config.user),
        ("--workdir", &config.working_dir),
    ];
    for (flag, value) in optional {
        if let Some(value) = value {
            cmd.push(flag.to_owned());
            cmd.push(value.clone());
        }
    }

    cmd.push(config.image.clone());
    cmd
}

fn path_str(path: &Path) -> Result<&str, EngineError> {
    path.to_str()
        .ok_or_else(|| EngineError::InvalidPath(path.to_path_buf()))
}

impl ContainerEngine for DockerCli {
    fn create(&self, config: &DockerConfig) -> Result<ContainerId, EngineError> {
        let output = self.exec(&run_args(config))?;
        Ok(ContainerId::new(output.trim()))
    }

    fn copy_into(&self, id: &ContainerId, local: &Path, remote: &str) -> Result<(), EngineError> {
        let local = path_str(local)?;
        self.exec(&[
            "cp".to_owned(),
            local.to_owned(),
            format!("{id}:{remote}"),
        ])?;
        Ok(())
    }

    fn exec_streaming(&self, id: &ContainerId, command: &str) -> Result<OutputLines, EngineError> {
        // `exec 2>&1` folds stderr of every chained step into the one stream.
        let script = format!("exec 2>&1; {command}");
        let mut child = Command::new(&self.binary)
            .args(["exec", id.as_str(), "sh", "-c", &script])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| EngineError::NotFound {
                binary: self.binary.clone(),
                source: e,
            })?;

        let Some(stdout) = child.stdout.take() else {
            return Err(EngineError::Stream {
                container: id.to_string(),
                command: command.to_owned(),
                source: std::io::Error::other("stdout was not captured"),
            });
        };

        Ok(Box::new(ExecLines {
            child,
            lines: BufReader::new(stdout).lines(),
            container: id.to_string(),
            command: command.to_owned(),
            finished: false,
        }))
    }

    fn copy_out_of(
        &self,
        id: &ContainerId,
        remote: &str,
        local: &Path,
    ) -> Result<(), EngineError> {
        let local = path_str(local)?;
        let remote = remote.trim_end_matches('/');
        self.exec(&[
            "cp".to_owned(),
            format!("{id}:{remote}/."),
            local.to_owned(),
        ])?;
        Ok(())
    }

    fn destroy(&self, id: &ContainerId) -> Result<(), EngineError> {
        self.exec(&["rm".to_owned(), "--force".to_owned(), id.to_string()])?;
        Ok(())
    }
}

/// Pulls lines from a running `exec` and reports its exit status at the end.
struct ExecLines {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    container: String,
    command: String,
    finished: bool,
}

impl Iterator for ExecLines {
    type Item = Result<String, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.lines.next() {
            Some(Ok(line)) => Some(Ok(line)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(EngineError::Stream {
                    container: self.container.clone(),
                    command: self.command.clone(),
                    source: e,
                }))
            }
            None => {
                self.finished = true;
                match self.child.wait() {
                    Ok(status) if status.success() => None,
                    Ok(status) => Some(Err(EngineError::ExecFailed {
                        container: self.container.clone(),
                        command: self.command.clone(),
                        code: status.code(),
                    })),
                    Err(e) => Some(Err(EngineError::Stream {
                        container: self.container.clone(),
                        command: self.command.clone(),
                        source: e,
                    })),
                }
            }
        }
    }
}

impl Drop for ExecLines {
    fn drop(&mut self) {
        if !self.finished {
            // Abandoned mid-stream: reap the engine process so it does not linger.
            if let Err(e) = self.child.kill().and_then(|()| self.child.wait().map(|_| ())) {
                tracing::debug!(error = %e, "failed to reap container exec process");
            }
        }
    }
}
