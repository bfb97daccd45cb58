use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lambda_build_core::DockerConfig;
use lambda_build_exec::container::{ContainerSession, with_container};
use lambda_build_exec::engine::{ContainerEngine, ContainerId, DockerCli, OutputLines, run_args};
use lambda_build_exec::error::EngineError;
use mockall::mock;

mock! {
    Engine {}

    impl ContainerEngine for Engine {
        fn create(&self, config: &DockerConfig) -> Result<ContainerId, EngineError>;
        fn copy_into(&self, id: &ContainerId, local: &Path, remote: &str) -> Result<(), EngineError>;
        fn exec_streaming(&self, id: &ContainerId, command: &str) -> Result<OutputLines, EngineError>;
        fn copy_out_of(&self, id: &ContainerId, remote: &str, local: &Path) -> Result<(), EngineError>;
        fn destroy(&self, id: &ContainerId) -> Result<(), EngineError>;
    }
}

#[derive(Debug)]
enum BodyError {
    Engine(EngineError),
    Install(&'static str),
}

impl From<EngineError> for BodyError {
    fn from(e: EngineError) -> Self {
        BodyError::Engine(e)
    }
}

fn config() -> DockerConfig {
    DockerConfig::new("public.ecr.aws/sam/build-python3.12")
}

fn engine_failure(op: &str) -> EngineError {
    EngineError::CommandFailed {
        args: vec![op.to_owned()],
        stderr: "No such container: abc123".to_owned(),
    }
}

fn started_engine() -> MockEngine {
    let mut mock = MockEngine::new();
    mock.expect_create()
        .withf(|config| config.image == "public.ecr.aws/sam/build-python3.12")
        .times(1)
        .returning(|_| Ok(ContainerId::new("abc123")));
    mock
}

// ── Scoped lifecycle ──

#[test]
fn with_container_destroys_after_success() {
    let mut mock = started_engine();
    mock.expect_destroy()
        .withf(|id| id.as_str() == "abc123")
        .times(1)
        .returning(|_| Ok(()));

    let result: Result<&str, EngineError> = with_container(&mock, &config(), |session| {
        assert_eq!(session.id().as_str(), "abc123");
        Ok("done")
    });

    assert_eq!(result.unwrap(), "done");
}

#[test]
fn with_container_destroys_after_body_error() {
    let mut mock = started_engine();
    mock.expect_copy_into()
        .times(1)
        .returning(|_, _, _| Err(engine_failure("cp")));
    mock.expect_destroy().times(1).returning(|_| Ok(()));

    let result: Result<(), EngineError> = with_container(&mock, &config(), |session| {
        session.copy_into(Path::new("/tmp/requirements.txt"), "/requirements.txt")
    });

    assert!(matches!(result, Err(EngineError::CommandFailed { .. })));
}

#[test]
fn teardown_failure_does_not_mask_body_error() {
    let mut mock = started_engine();
    mock.expect_destroy()
        .times(1)
        .returning(|_| Err(engine_failure("rm")));

    let result: Result<(), BodyError> =
        with_container(&mock, &config(), |_| Err(BodyError::Install("pip failed")));

    assert!(matches!(result, Err(BodyError::Install("pip failed"))));
}

#[test]
fn teardown_failure_after_success_is_only_logged() {
    let mut mock = started_engine();
    mock.expect_destroy()
        .times(1)
        .returning(|_| Err(engine_failure("rm")));

    let result: Result<u8, EngineError> = with_container(&mock, &config(), |_| Ok(7));

    assert_eq!(result.unwrap(), 7);
}

#[test]
fn create_failure_never_destroys() {
    let mut mock = MockEngine::new();
    mock.expect_create()
        .returning(|_| Err(engine_failure("run")));
    mock.expect_destroy().never();

    let result: Result<(), BodyError> = with_container(&mock, &config(), |_| Ok(()));

    assert!(matches!(
        result,
        Err(BodyError::Engine(EngineError::CommandFailed { .. }))
    ));
}

#[test]
fn dropped_session_is_destroyed_once() {
    let mut mock = started_engine();
    mock.expect_destroy().times(1).returning(|_| Ok(()));

    {
        let _session = ContainerSession::start(&mock, &config()).unwrap();
    }
}

#[test]
fn released_session_is_not_destroyed_again_on_drop() {
    let mut mock = started_engine();
    mock.expect_destroy().times(1).returning(|_| Ok(()));

    let session = ContainerSession::start(&mock, &config()).unwrap();
    session.release();
}

// ── Session operations ──

#[test]
fn exec_streaming_yields_lines_in_order() {
    let mut mock = started_engine();
    mock.expect_exec_streaming()
        .withf(|id, command| id.as_str() == "abc123" && command == "pip install -r /requirements.txt")
        .returning(|_, _| {
            let lines: Vec<Result<String, EngineError>> = vec![
                Ok("Collecting requests".to_owned()),
                Ok("Successfully installed requests".to_owned()),
            ];
            Ok(Box::new(lines.into_iter()) as OutputLines)
        });
    mock.expect_destroy().returning(|_| Ok(()));

    let lines: Result<Vec<String>, EngineError> = with_container(&mock, &config(), |session| {
        session
            .exec_streaming("pip install -r /requirements.txt")?
            .collect()
    });

    assert_eq!(
        lines.unwrap(),
        vec!["Collecting requests", "Successfully installed requests"]
    );
}

#[test]
fn copy_out_of_creates_local_directory() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dest = tmp.path().join("layer_output").join("python");
    let seen = Arc::new(Mutex::new(None::<PathBuf>));
    let seen_in_mock = Arc::clone(&seen);

    let mut mock = started_engine();
    mock.expect_copy_out_of()
        .withf(|_, remote, _| remote == "/opt/lambda/cache")
        .returning(move |_, _, local| {
            assert!(local.is_dir());
            *seen_in_mock.lock().unwrap() = Some(local.to_path_buf());
            Ok(())
        });
    mock.expect_destroy().returning(|_| Ok(()));

    let result: Result<(), EngineError> = with_container(&mock, &config(), |session| {
        session.copy_out_of("/opt/lambda/cache", &dest)
    });

    result.unwrap();
    assert_eq!(seen.lock().unwrap().as_deref(), Some(dest.as_path()));
}

// ── docker run arguments ──

#[test]
fn run_args_minimal() {
    let args = run_args(&config());

    assert_eq!(
        args,
        vec![
            "run",
            "--detach",
            "--tty",
            "--entrypoint",
            "/bin/sh",
            "public.ecr.aws/sam/build-python3.12",
        ]
    );
}

#[test]
fn run_args_include_optional_settings_before_image() {
    let mut config = config();
    config.environment.insert("PIP_NO_COLOR".to_owned(), "1".to_owned());
    config.volumes.push("/tmp/cache:/root/.cache".to_owned());
    config.network = Some("host".to_owned());
    config.platform = Some("linux/arm64".to_owned());

    let args = run_args(&config);

    let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
    assert_eq!(args[pos("--env") + 1], "PIP_NO_COLOR=1");
    assert_eq!(args[pos("--volume") + 1], "/tmp/cache:/root/.cache");
    assert_eq!(args[pos("--network") + 1], "host");
    assert_eq!(args[pos("--platform") + 1], "linux/arm64");
    assert!(!args.contains(&"--user".to_owned()));
    assert_eq!(args.last().unwrap(), "public.ecr.aws/sam/build-python3.12");
}

#[test]
fn engine_binary_comes_from_docker_table() {
    let mut config = config();
    config.engine = "podman".to_owned();

    assert_eq!(DockerCli::from_config(Some(&config)).binary(), "podman");
    assert_eq!(DockerCli::from_config(None).binary(), "docker");
}

#[test]
fn run_args_never_name_the_engine() {
    let mut config = config();
    config.engine = "podman".to_owned();

    assert!(!run_args(&config).contains(&"podman".to_owned()));
}
