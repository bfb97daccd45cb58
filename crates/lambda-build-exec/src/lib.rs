pub mod container;
pub mod engine;
pub mod error;
pub mod executor;
pub mod runner;

pub use container::{ContainerSession, with_container};
pub use engine::{ContainerEngine, ContainerId, DockerCli, OutputLines};
pub use error::{EngineError, ExecError};
pub use executor::{RawOutput, ShellExecutor, SystemShell};
pub use runner::{ExecutionResult, ExitClass, ProcessRunner};
