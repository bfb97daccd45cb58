use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File the `[tool.lambda-build]` table is read from.
pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// `[tool.lambda-build]` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LambdaBuildConfig {
    /// Dependency groups excluded from the export
    #[serde(default)]
    pub without: Vec<String>,
    /// Optional dependency groups included in the export
    #[serde(default)]
    pub with: Vec<String>,
    /// Restrict the export to these groups only
    #[serde(default)]
    pub only: Vec<String>,
    /// Combined (dependencies + project) artifact, relative to the project
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
    /// Subdirectory the combined package is installed into
    #[serde(default)]
    pub install_dir: String,
    /// Dependency layer artifact. Setting it switches to separate builds.
    #[serde(default)]
    pub layer_artifact_path: Option<PathBuf>,
    /// Subdirectory dependencies land in inside the layer, e.g. `python`
    #[serde(default)]
    pub layer_install_dir: String,
    /// Function code artifact. Setting it switches to separate builds.
    #[serde(default)]
    pub function_artifact_path: Option<PathBuf>,
    #[serde(default)]
    pub function_install_dir: String,
    /// Template installing the exported requirements
    #[serde(default = "default_install_deps_cmd")]
    pub install_deps_cmd: String,
    /// Template installing the project itself without dependencies
    #[serde(default = "default_install_no_deps_cmd")]
    pub install_no_deps_cmd: String,
    /// Install dependencies inside a container. Defaults to whether
    /// a `docker` table is present.
    #[serde(default)]
    pub in_container: Option<bool>,
    #[serde(default)]
    pub docker: Option<DockerConfig>,
}

/// `[tool.lambda-build.docker]`: the container dependencies are installed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DockerConfig {
    /// Image matching the target runtime, e.g. `public.ecr.aws/sam/build-python3.12`
    pub image: String,
    /// Docker-compatible CLI driving the container, e.g. `podman`
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Entrypoint kept alive with a TTY while the session is open
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Bind mounts in `host:container[:mode]` form
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl DockerConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            engine: default_engine(),
            entrypoint: default_entrypoint(),
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            network: None,
            platform: None,
            user: None,
            working_dir: None,
        }
    }
}

impl Default for LambdaBuildConfig {
    fn default() -> Self {
        Self {
            without: Vec::new(),
            with: Vec::new(),
            only: Vec::new(),
            artifact_path: default_artifact_path(),
            install_dir: String::new(),
            layer_artifact_path: None,
            layer_install_dir: String::new(),
            function_artifact_path: None,
            function_install_dir: String::new(),
            install_deps_cmd: default_install_deps_cmd(),
            install_no_deps_cmd: default_install_no_deps_cmd(),
            in_container: None,
            docker: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    tool: ToolTable,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(rename = "lambda-build")]
    lambda_build: Option<LambdaBuildConfig>,
}

impl LambdaBuildConfig {
    /// Load `[tool.lambda-build]` from the project's pyproject.toml, or return
    /// defaults if the file or the table is absent.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(PYPROJECT_FILE);
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no pyproject.toml, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.clone(),
                source: e,
            })?;
        let pyproject: PyProject =
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })?;

        Ok(pyproject.tool.lambda_build.unwrap_or_default())
    }

    /// Resolve into the immutable parameters of one build invocation.
    ///
    /// Artifact paths become absolute (joined onto the canonical project
    /// directory) and the container decision is made here, so a missing
    /// docker table is reported before any command runs.
    pub fn resolve(self, project_dir: &Path) -> crate::Result<BuildParameters> {
        let root = project_dir
            .canonicalize()
            .map_err(|e| crate::Error::ProjectDirResolve {
                path: project_dir.to_path_buf(),
                source: e,
            })?;

        let in_container = self.in_container.unwrap_or(self.docker.is_some());
        if in_container && self.docker.is_none() {
            return Err(crate::Error::MissingContainerConfig);
        }

        let target = |path: &Path, install_dir: &str| ArtifactTarget {
            artifact_path: root.join(path),
            install_dir: install_dir.to_owned(),
        };

        Ok(BuildParameters {
            install_deps_cmd: self.install_deps_cmd,
            install_no_deps_cmd: self.install_no_deps_cmd,
            in_container,
            groups: DependencyGroups {
                without: self.without,
                with: self.with,
                only: self.only,
            },
            package: target(&self.artifact_path, &self.install_dir),
            layer: self
                .layer_artifact_path
                .as_deref()
                .map(|p| target(p, &self.layer_install_dir)),
            function: self
                .function_artifact_path
                .as_deref()
                .map(|p| target(p, &self.function_install_dir)),
            docker: self.docker,
        })
    }
}

/// Dependency-group filters forwarded to the export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGroups {
    pub without: Vec<String>,
    pub with: Vec<String>,
    pub only: Vec<String>,
}

/// Where one artifact is written and which installed subdirectory becomes
/// its internal prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactTarget {
    /// Absolute path of the zip file
    pub artifact_path: PathBuf,
    /// Subpath of the working tree the content is installed under
    pub install_dir: String,
}

/// Parameters for a single build invocation. Read-only to the pipelines.
#[derive(Debug, Clone, Serialize)]
pub struct BuildParameters {
    pub install_deps_cmd: String,
    pub install_no_deps_cmd: String,
    pub in_container: bool,
    pub groups: DependencyGroups,
    pub package: ArtifactTarget,
    pub layer: Option<ArtifactTarget>,
    pub function: Option<ArtifactTarget>,
    pub docker: Option<DockerConfig>,
}

impl BuildParameters {
    /// Container settings when dependencies must be installed in a container.
    pub fn container(&self) -> crate::Result<Option<&DockerConfig>> {
        if !self.in_container {
            return Ok(None);
        }
        self.docker
            .as_ref()
            .map(Some)
            .ok_or(crate::Error::MissingContainerConfig)
    }

    /// The builds this configuration asks for, in execution order.
    ///
    /// Separate layer/function builds when either path is configured,
    /// otherwise the single combined package.
    pub fn plan(&self) -> Vec<(BuildKind, &ArtifactTarget)> {
        let mut plan = Vec::new();
        if let Some(layer) = &self.layer {
            plan.push((BuildKind::Layer, layer));
        }
        if let Some(function) = &self.function {
            plan.push((BuildKind::Function, function));
        }
        if plan.is_empty() {
            plan.push((BuildKind::Package, &self.package));
        }
        plan
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// Third-party dependencies only
    Layer,
    /// Project code only
    Function,
    /// Dependencies and project code in one archive
    Package,
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildKind::Layer => "layer",
            BuildKind::Function => "function",
            BuildKind::Package => "package",
        })
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("package.zip")
}

fn default_install_deps_cmd() -> String {
    "{mkdir} {container_cache_dir} {chain_operator} \
     pip install -q -t {container_cache_dir} --no-cache-dir -r {requirements}"
        .to_owned()
}

fn default_install_no_deps_cmd() -> String {
    "{mkdir} {package_dir} {chain_operator} \
     poetry run pip install -q -t {package_dir} --no-deps ."
        .to_owned()
}

fn default_engine() -> String {
    "docker".to_owned()
}

fn default_entrypoint() -> String {
    "/bin/sh".to_owned()
}
