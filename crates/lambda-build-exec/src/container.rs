use std::path::Path;

use lambda_build_core::DockerConfig;

use crate::engine::{ContainerEngine, ContainerId, OutputLines};
use crate::error::EngineError;

/// One live container, destroyed exactly once when the session ends.
///
/// Prefer [`with_container`], which releases explicitly after the body runs.
/// Dropping an unreleased session (early return, unwinding) also destroys
/// the container.
pub struct ContainerSession<'e, E: ContainerEngine> {
    engine: &'e E,
    id: ContainerId,
    released: bool,
}

impl<'e, E: ContainerEngine> ContainerSession<'e, E> {
    /// Create the container described by `config`.
    pub fn start(engine: &'e E, config: &DockerConfig) -> Result<Self, EngineError> {
        tracing::info!("Starting container from {}", config.image);
        let id = engine.create(config)?;
        tracing::debug!(container = %id, "container started");
        Ok(Self {
            engine,
            id,
            released: false,
        })
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn copy_into(&self, local: &Path, remote: &str) -> Result<(), EngineError> {
        tracing::debug!(container = %self.id, "copying {} to {remote}", local.display());
        self.engine.copy_into(&self.id, local, remote)
    }

    pub fn exec_streaming(&self, command: &str) -> Result<OutputLines, EngineError> {
        tracing::debug!(container = %self.id, "Executing: {command}");
        self.engine.exec_streaming(&self.id, command)
    }

    /// Copy the `remote` directory tree into `local`, creating `local` first.
    pub fn copy_out_of(&self, remote: &str, local: &Path) -> Result<(), EngineError> {
        std::fs::create_dir_all(local).map_err(|e| EngineError::LocalIo {
            path: local.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(container = %self.id, "copying {remote} to {}", local.display());
        self.engine.copy_out_of(&self.id, remote, local)
    }

    /// Destroy the container. Failures are logged, never returned, so they
    /// cannot mask an error from the session body.
    pub fn release(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.engine.destroy(&self.id) {
            Ok(()) => tracing::debug!(container = %self.id, "container removed"),
            Err(e) => tracing::warn!(
                container = %self.id,
                error = %e,
                "failed to remove container; remove it manually"
            ),
        }
    }
}

impl<E: ContainerEngine> Drop for ContainerSession<'_, E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Run `body` against a fresh container and destroy the container afterwards,
/// whether the body succeeded or not.
pub fn with_container<E, T, Err, F>(engine: &E, config: &DockerConfig, body: F) -> Result<T, Err>
where
    E: ContainerEngine,
    Err: From<EngineError>,
    F: FnOnce(&ContainerSession<'_, E>) -> Result<T, Err>,
{
    let session = ContainerSession::start(engine, config)?;
    let result = body(&session);
    session.release();
    result
}
