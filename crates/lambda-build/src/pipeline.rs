use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use lambda_build_core::{ArtifactTarget, BuildKind, BuildParameters, DockerConfig, ShellIdiom};
use lambda_build_exec::{
    ContainerEngine, ContainerSession, DockerCli, EngineError, ProcessRunner, ShellExecutor,
    SystemShell, with_container,
};
use tempfile::TempDir;

use crate::archive::{
    ArchiveAssembler, ArchiveError, BYTECODE_EXCLUDES, ZipAssembler, archive_root,
};
use crate::command::{InstallPlaceholders, export_command, render_install_command};
use crate::error::BuildError;

/// Install destination inside the container, whatever the configured install dir.
pub const CONTAINER_CACHE_DIR: &str = "/opt/lambda/cache";

/// Where the requirements file is copied inside the container.
pub const CONTAINER_REQUIREMENTS_PATH: &str = "/requirements.txt";

const REQUIREMENTS_FILE: &str = "requirements.txt";
const LAYER_OUTPUT_DIR: &str = "layer_output";

/// Streamed lines kept to report a failed container install.
const FAILURE_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Init,
    Exported,
    Installed,
    Packaged,
    Done,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildStage::Init => "init",
            BuildStage::Exported => "exported",
            BuildStage::Installed => "installed",
            BuildStage::Packaged => "packaged",
            BuildStage::Done => "done",
        })
    }
}

/// Result of one successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub kind: BuildKind,
    pub artifact: PathBuf,
    /// Stages reached, in order.
    pub stages: Vec<BuildStage>,
}

struct Progress {
    kind: BuildKind,
    stages: Vec<BuildStage>,
}

impl Progress {
    fn new(kind: BuildKind) -> Self {
        Self {
            kind,
            stages: vec![BuildStage::Init],
        }
    }

    fn advance(&mut self, stage: BuildStage) {
        tracing::debug!(build = %self.kind, %stage, "stage reached");
        self.stages.push(stage);
    }

    fn current(&self) -> BuildStage {
        self.stages.last().copied().unwrap_or(BuildStage::Init)
    }

    /// Stage being worked towards; the one that failed if the build stops now.
    fn pending(&self) -> BuildStage {
        match self.current() {
            BuildStage::Init if self.kind == BuildKind::Function => BuildStage::Installed,
            BuildStage::Init => BuildStage::Exported,
            BuildStage::Exported => BuildStage::Installed,
            BuildStage::Installed => BuildStage::Packaged,
            BuildStage::Packaged | BuildStage::Done => BuildStage::Done,
        }
    }

    fn conclude(
        mut self,
        result: Result<(), BuildError>,
        target: &ArtifactTarget,
    ) -> Result<BuildReport, BuildError> {
        match result {
            Ok(()) => {
                self.advance(BuildStage::Done);
                Ok(BuildReport {
                    kind: self.kind,
                    artifact: target.artifact_path.clone(),
                    stages: self.stages,
                })
            }
            Err(e) => {
                tracing::error!(
                    build = %self.kind,
                    stage = %self.pending(),
                    error = %e,
                    "build failed"
                );
                Err(e)
            }
        }
    }
}

/// Runs the layer, function, and combined build pipelines.
///
/// Parameterized over the shell, container engine, and archive writer for
/// testability. Every command runs with the project directory as its working
/// directory.
pub struct Builder<S = SystemShell, C = DockerCli, A = ZipAssembler>
where
    S: ShellExecutor,
    C: ContainerEngine,
    A: ArchiveAssembler,
{
    runner: ProcessRunner<S>,
    engine: C,
    assembler: A,
    idiom: ShellIdiom,
    project_dir: PathBuf,
}

impl Builder {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self::with_engine(project_dir, DockerCli::new())
    }

    /// Builder driving the container engine the parameters name.
    pub fn for_parameters(project_dir: impl Into<PathBuf>, params: &BuildParameters) -> Self {
        Self::with_engine(project_dir, DockerCli::from_config(params.docker.as_ref()))
    }
}

impl<C: ContainerEngine> Builder<SystemShell, C, ZipAssembler> {
    pub fn with_engine(project_dir: impl Into<PathBuf>, engine: C) -> Self {
        let idiom = ShellIdiom::host();
        Self {
            runner: ProcessRunner::new(idiom),
            engine,
            assembler: ZipAssembler,
            idiom,
            project_dir: project_dir.into(),
        }
    }
}

impl<S, C, A> Builder<S, C, A>
where
    S: ShellExecutor,
    C: ContainerEngine,
    A: ArchiveAssembler,
{
    pub fn with_parts(
        project_dir: impl Into<PathBuf>,
        idiom: ShellIdiom,
        shell: S,
        engine: C,
        assembler: A,
    ) -> Self {
        Self {
            runner: ProcessRunner::with_executor(shell),
            engine,
            assembler,
            idiom,
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Run every build [`BuildParameters::plan`] asks for, stopping at the
    /// first failure.
    pub fn build(&self, params: &BuildParameters) -> Result<Vec<BuildReport>, BuildError> {
        params
            .plan()
            .into_iter()
            .map(|(kind, target)| self.build_kind(kind, params, target))
            .collect()
    }

    pub fn build_kind(
        &self,
        kind: BuildKind,
        params: &BuildParameters,
        target: &ArtifactTarget,
    ) -> Result<BuildReport, BuildError> {
        match kind {
            BuildKind::Layer => self.create_separate_layer_package(params, target),
            BuildKind::Function => self.create_separated_function_package(params, target),
            BuildKind::Package => self.create_package(params, target),
        }
    }

    /// Dependencies only: export, install (container or local), package.
    pub fn create_separate_layer_package(
        &self,
        params: &BuildParameters,
        target: &ArtifactTarget,
    ) -> Result<BuildReport, BuildError> {
        let mut progress = Progress::new(BuildKind::Layer);
        let result = self.run_layer(params, target, &mut progress);
        progress.conclude(result, target)
    }

    /// Project code only: no export, one local no-deps install, package
    /// without excludes.
    pub fn create_separated_function_package(
        &self,
        params: &BuildParameters,
        target: &ArtifactTarget,
    ) -> Result<BuildReport, BuildError> {
        let mut progress = Progress::new(BuildKind::Function);
        let result = self.run_function(params, target, &mut progress);
        progress.conclude(result, target)
    }

    /// Dependencies and project code merged under one archive root.
    pub fn create_package(
        &self,
        params: &BuildParameters,
        target: &ArtifactTarget,
    ) -> Result<BuildReport, BuildError> {
        let mut progress = Progress::new(BuildKind::Package);
        let result = self.run_package(params, target, &mut progress);
        progress.conclude(result, target)
    }

    fn run_layer(
        &self,
        params: &BuildParameters,
        target: &ArtifactTarget,
        progress: &mut Progress,
    ) -> Result<(), BuildError> {
        let work_dir = create_work_dir()?;
        let requirements = work_dir.path().join(REQUIREMENTS_FILE);
        let output_dir = join_install_dir(
            &work_dir.path().join(LAYER_OUTPUT_DIR),
            &target.install_dir,
        );

        self.export_requirements(params, &requirements)?;
        progress.advance(BuildStage::Exported);

        self.install_dependencies(params, &requirements, &output_dir)?;
        progress.advance(BuildStage::Installed);

        self.package(
            &archive_root(&output_dir, &target.install_dir),
            &target.artifact_path,
            &package_excludes(&requirements),
        )?;
        progress.advance(BuildStage::Packaged);

        close_work_dir(work_dir);
        Ok(())
    }

    fn run_function(
        &self,
        params: &BuildParameters,
        target: &ArtifactTarget,
        progress: &mut Progress,
    ) -> Result<(), BuildError> {
        let work_dir = create_work_dir()?;
        let package_dir = join_install_dir(work_dir.path(), &target.install_dir);

        tracing::info!("Building function package...");
        self.install_project(params, &package_dir)?;
        progress.advance(BuildStage::Installed);

        self.package(
            &archive_root(&package_dir, &target.install_dir),
            &target.artifact_path,
            &[],
        )?;
        progress.advance(BuildStage::Packaged);

        close_work_dir(work_dir);
        Ok(())
    }

    fn run_package(
        &self,
        params: &BuildParameters,
        target: &ArtifactTarget,
        progress: &mut Progress,
    ) -> Result<(), BuildError> {
        let work_dir = create_work_dir()?;
        let package_dir = join_install_dir(work_dir.path(), &target.install_dir);
        std::fs::create_dir_all(&package_dir).map_err(|e| BuildError::WorkDir {
            path: package_dir.clone(),
            source: e,
        })?;
        let requirements = package_dir.join(REQUIREMENTS_FILE);

        self.export_requirements(params, &requirements)?;
        progress.advance(BuildStage::Exported);

        self.install_dependencies(params, &requirements, &package_dir)?;
        self.install_project(params, &package_dir)?;
        progress.advance(BuildStage::Installed);

        self.package(
            &archive_root(&package_dir, &target.install_dir),
            &target.artifact_path,
            &package_excludes(&requirements),
        )?;
        progress.advance(BuildStage::Packaged);

        close_work_dir(work_dir);
        Ok(())
    }

    // ── Stages ──

    fn export_requirements(
        &self,
        params: &BuildParameters,
        requirements: &Path,
    ) -> Result<(), BuildError> {
        tracing::info!("Generating requirements file...");
        let command = export_command(&params.groups);
        let manifest = self.runner.run(&command, &self.project_dir)?;

        std::fs::write(requirements, manifest).map_err(|e| BuildError::WorkDir {
            path: requirements.to_path_buf(),
            source: e,
        })
    }

    fn install_dependencies(
        &self,
        params: &BuildParameters,
        requirements: &Path,
        output_dir: &Path,
    ) -> Result<(), BuildError> {
        match params.container()? {
            Some(docker) => self.install_in_container(docker, params, requirements, output_dir),
            None => self.install_locally(params, requirements, output_dir),
        }
    }

    fn install_in_container(
        &self,
        docker: &DockerConfig,
        params: &BuildParameters,
        requirements: &Path,
        output_dir: &Path,
    ) -> Result<(), BuildError> {
        // Commands run under the container's `sh`, not the host shell.
        let command = render_install_command(
            &params.install_deps_cmd,
            &InstallPlaceholders::new(
                &ShellIdiom::posix(),
                CONTAINER_CACHE_DIR,
                Some(CONTAINER_REQUIREMENTS_PATH),
            ),
        );

        with_container(&self.engine, docker, |session| -> Result<(), BuildError> {
            session.copy_into(requirements, CONTAINER_REQUIREMENTS_PATH)?;

            tracing::info!("Installing requirements");
            stream_install(session, &command)?;

            tracing::info!("Copying output to {}", output_dir.display());
            session.copy_out_of(CONTAINER_CACHE_DIR, output_dir)?;
            Ok(())
        })
    }

    fn install_locally(
        &self,
        params: &BuildParameters,
        requirements: &Path,
        output_dir: &Path,
    ) -> Result<(), BuildError> {
        let output_dir = output_dir.display().to_string();
        let requirements = requirements.display().to_string();
        let command = render_install_command(
            &params.install_deps_cmd,
            &InstallPlaceholders::new(&self.idiom, &output_dir, Some(&requirements)),
        );

        tracing::info!("Installing requirements locally");
        self.runner.run(&command, &self.project_dir)?;
        Ok(())
    }

    fn install_project(&self, params: &BuildParameters, package_dir: &Path) -> Result<(), BuildError> {
        let package_dir = package_dir.display().to_string();
        let command = render_install_command(
            &params.install_no_deps_cmd,
            &InstallPlaceholders::new(&self.idiom, &package_dir, None),
        );

        tracing::info!("Installing project");
        self.runner.run(&command, &self.project_dir)?;
        Ok(())
    }

    fn package(&self, source: &Path, target: &Path, excludes: &[String]) -> Result<(), BuildError> {
        tracing::info!("Building {}...", target.display());

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::Packaging {
                target: target.to_path_buf(),
                source: ArchiveError::Write {
                    path: parent.to_path_buf(),
                    source: e,
                },
            })?;
        }

        self.assembler
            .assemble(source, target, excludes)
            .map_err(|e| BuildError::Packaging {
                target: target.to_path_buf(),
                source: e,
            })?;

        tracing::info!("Target successfully built: {}", target.display());
        Ok(())
    }
}

/// Forward streamed install output to the log, keeping a short tail for the
/// error if the command fails.
fn stream_install<E: ContainerEngine>(
    session: &ContainerSession<'_, E>,
    command: &str,
) -> Result<(), BuildError> {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(FAILURE_TAIL_LINES);

    for line in session.exec_streaming(command)? {
        match line {
            Ok(line) => {
                let line = line.trim_end();
                tracing::info!("{line}");
                if tail.len() == FAILURE_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_owned());
            }
            Err(EngineError::ExecFailed { .. }) => {
                return Err(BuildError::CommandExecution {
                    command: command.to_owned(),
                    output: Vec::from(tail).join("\n"),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn package_excludes(requirements: &Path) -> Vec<String> {
    let mut excludes: Vec<String> = BYTECODE_EXCLUDES.iter().map(|p| (*p).to_owned()).collect();
    excludes.push(glob::Pattern::escape(&requirements.display().to_string()));
    excludes
}

fn join_install_dir(base: &Path, install_dir: &str) -> PathBuf {
    if install_dir.is_empty() {
        base.to_path_buf()
    } else {
        base.join(install_dir)
    }
}

fn create_work_dir() -> Result<TempDir, BuildError> {
    tempfile::Builder::new()
        .prefix("lambda-build-")
        .tempdir()
        .map_err(|e| BuildError::WorkDir {
            path: std::env::temp_dir(),
            source: e,
        })
}

fn close_work_dir(work_dir: TempDir) {
    let path = work_dir.path().to_path_buf();
    if let Err(e) = work_dir.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove working directory");
    }
}
