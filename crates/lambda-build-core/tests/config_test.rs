use lambda_build_core::{BuildKind, Error, LambdaBuildConfig, ShellIdiom};
use tempfile::TempDir;

fn write_pyproject(dir: &TempDir, body: &str) {
    std::fs::write(dir.path().join("pyproject.toml"), body).unwrap();
}

#[test]
fn load_returns_defaults_when_no_pyproject() {
    let tmp = TempDir::new().unwrap();
    let config = LambdaBuildConfig::load(tmp.path()).unwrap();

    assert!(config.without.is_empty());
    assert!(config.with.is_empty());
    assert!(config.only.is_empty());
    assert_eq!(config.artifact_path, std::path::PathBuf::from("package.zip"));
    assert_eq!(config.install_dir, "");
    assert!(config.layer_artifact_path.is_none());
    assert!(config.function_artifact_path.is_none());
    assert!(config.install_deps_cmd.contains("{requirements}"));
    assert!(config.install_no_deps_cmd.contains("{package_dir}"));
    assert!(config.in_container.is_none());
    assert!(config.docker.is_none());
}

#[test]
fn load_returns_defaults_when_table_missing() {
    let tmp = TempDir::new().unwrap();
    write_pyproject(
        &tmp,
        r#"
[tool.poetry]
name = "service"
version = "0.1.0"
"#,
    );

    let config = LambdaBuildConfig::load(tmp.path()).unwrap();
    assert!(config.docker.is_none());
    assert_eq!(config.install_dir, "");
}

#[test]
fn load_parses_full_table() {
    let tmp = TempDir::new().unwrap();
    write_pyproject(
        &tmp,
        r#"
[tool.poetry]
name = "service"

[tool.lambda-build]
without = ["dev", "test"]
only = ["main"]
layer-artifact-path = "dist/layer.zip"
layer-install-dir = "python"
function-artifact-path = "dist/function.zip"
install-deps-cmd = "{mkdir} {container_cache_dir} {chain_operator} pip install -t {container_cache_dir} -r {requirements}"

[tool.lambda-build.docker]
image = "public.ecr.aws/sam/build-python3.12"
network = "host"
volumes = ["/tmp/pip:/root/.cache/pip"]

[tool.lambda-build.docker.environment]
PIP_INDEX_URL = "https://pypi.internal/simple"
"#,
    );

    let config = LambdaBuildConfig::load(tmp.path()).unwrap();

    assert_eq!(config.without, vec!["dev", "test"]);
    assert!(config.with.is_empty());
    assert_eq!(config.only, vec!["main"]);
    assert_eq!(config.layer_install_dir, "python");
    assert!(config.install_deps_cmd.starts_with("{mkdir}"));

    let docker = config.docker.expect("docker table");
    assert_eq!(docker.image, "public.ecr.aws/sam/build-python3.12");
    assert_eq!(docker.engine, "docker");
    assert_eq!(docker.entrypoint, "/bin/sh");
    assert_eq!(docker.network.as_deref(), Some("host"));
    assert_eq!(docker.volumes, vec!["/tmp/pip:/root/.cache/pip"]);
    assert_eq!(
        docker.environment.get("PIP_INDEX_URL").map(String::as_str),
        Some("https://pypi.internal/simple")
    );
}

#[test]
fn load_parses_alternative_engine() {
    let tmp = TempDir::new().unwrap();
    write_pyproject(
        &tmp,
        r#"
[tool.lambda-build.docker]
image = "python:3.12"
engine = "podman"
"#,
    );

    let config = LambdaBuildConfig::load(tmp.path()).unwrap();

    assert_eq!(config.docker.expect("docker table").engine, "podman");
}

#[test]
fn load_rejects_docker_table_without_image() {
    let tmp = TempDir::new().unwrap();
    write_pyproject(
        &tmp,
        r#"
[tool.lambda-build.docker]
network = "host"
"#,
    );

    let result = LambdaBuildConfig::load(tmp.path());
    assert!(matches!(result, Err(Error::ConfigParse { .. })));
}

#[test]
fn load_rejects_unknown_docker_key() {
    let tmp = TempDir::new().unwrap();
    write_pyproject(
        &tmp,
        r#"
[tool.lambda-build.docker]
image = "python:3.12"
imgae = "typo"
"#,
    );

    let result = LambdaBuildConfig::load(tmp.path());
    assert!(matches!(result, Err(Error::ConfigParse { .. })));
}

#[test]
fn load_reports_invalid_toml() {
    let tmp = TempDir::new().unwrap();
    write_pyproject(&tmp, "[tool.lambda-build\n");

    let err = LambdaBuildConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("pyproject.toml"));
}

// ── Resolution ──

#[test]
fn resolve_makes_artifact_paths_absolute() {
    let tmp = TempDir::new().unwrap();
    let params = LambdaBuildConfig::default().resolve(tmp.path()).unwrap();

    let root = tmp.path().canonicalize().unwrap();
    assert!(params.package.artifact_path.is_absolute());
    assert_eq!(params.package.artifact_path, root.join("package.zip"));
}

#[test]
fn resolve_defaults_to_local_without_docker_table() {
    let tmp = TempDir::new().unwrap();
    let params = LambdaBuildConfig::default().resolve(tmp.path()).unwrap();

    assert!(!params.in_container);
    assert!(params.container().unwrap().is_none());
}

#[test]
fn resolve_defaults_to_container_with_docker_table() {
    let tmp = TempDir::new().unwrap();
    let config = LambdaBuildConfig {
        docker: Some(lambda_build_core::DockerConfig::new("python:3.12")),
        ..Default::default()
    };
    let params = config.resolve(tmp.path()).unwrap();

    assert!(params.in_container);
    assert_eq!(params.container().unwrap().unwrap().image, "python:3.12");
}

#[test]
fn resolve_local_override_keeps_docker_table_unused() {
    let tmp = TempDir::new().unwrap();
    let config = LambdaBuildConfig {
        in_container: Some(false),
        docker: Some(lambda_build_core::DockerConfig::new("python:3.12")),
        ..Default::default()
    };
    let params = config.resolve(tmp.path()).unwrap();

    assert!(!params.in_container);
    assert!(params.container().unwrap().is_none());
}

#[test]
fn resolve_container_without_docker_table_fails() {
    let tmp = TempDir::new().unwrap();
    let config = LambdaBuildConfig {
        in_container: Some(true),
        ..Default::default()
    };

    let result = config.resolve(tmp.path());
    assert!(matches!(result, Err(Error::MissingContainerConfig)));
}

#[test]
fn resolve_missing_project_dir_fails() {
    let tmp = TempDir::new().unwrap();
    let result = LambdaBuildConfig::default().resolve(&tmp.path().join("missing"));
    assert!(matches!(result, Err(Error::ProjectDirResolve { .. })));
}

// ── Build plan ──

#[test]
fn plan_is_combined_package_by_default() {
    let tmp = TempDir::new().unwrap();
    let params = LambdaBuildConfig::default().resolve(tmp.path()).unwrap();

    let plan = params.plan();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].0, BuildKind::Package);
}

#[test]
fn plan_runs_layer_before_function() {
    let tmp = TempDir::new().unwrap();
    let config = LambdaBuildConfig {
        layer_artifact_path: Some("layer.zip".into()),
        layer_install_dir: "python".to_owned(),
        function_artifact_path: Some("function.zip".into()),
        ..Default::default()
    };
    let params = config.resolve(tmp.path()).unwrap();

    let kinds: Vec<BuildKind> = params.plan().iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, vec![BuildKind::Layer, BuildKind::Function]);
    assert_eq!(params.plan()[0].1.install_dir, "python");
}

#[test]
fn plan_with_only_function_skips_combined_package() {
    let tmp = TempDir::new().unwrap();
    let config = LambdaBuildConfig {
        function_artifact_path: Some("function.zip".into()),
        ..Default::default()
    };
    let params = config.resolve(tmp.path()).unwrap();

    let kinds: Vec<BuildKind> = params.plan().iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, vec![BuildKind::Function]);
}

// ── Shell idiom ──

#[test]
fn posix_and_windows_idioms_differ() {
    let posix = ShellIdiom::posix();
    let windows = ShellIdiom::windows();

    assert_eq!(posix.mkdir, "mkdir -p");
    assert_eq!(posix.chain_operator, "&&");
    assert_eq!(windows.mkdir, "mkdir");
    assert_eq!(windows.chain_operator, ";");
}

#[test]
fn host_idiom_matches_target_family() {
    let expected = if cfg!(windows) {
        ShellIdiom::windows()
    } else {
        ShellIdiom::posix()
    };
    assert_eq!(ShellIdiom::host(), expected);
}
