//! Core types and configuration for lambda-build.
//!
//! This crate defines the `[tool.lambda-build]` schema ([`LambdaBuildConfig`]),
//! the resolved per-invocation [`BuildParameters`], the host shell idiom
//! ([`ShellIdiom`]), and shared error types.

pub mod config;
pub mod error;
pub mod shell;

pub use config::{
    ArtifactTarget, BuildKind, BuildParameters, DependencyGroups, DockerConfig, LambdaBuildConfig,
};
pub use error::{Error, Result};
pub use shell::ShellIdiom;
