mod build;
mod config;
mod doctor;

use std::path::PathBuf;

use clap::Args;
use lambda_build_core::{BuildParameters, LambdaBuildConfig};

pub use build::{build, build_one};
pub use config::show_config;
pub use doctor::doctor;

/// Flags that take precedence over `[tool.lambda-build]`.
#[derive(Args, Debug, Clone)]
pub struct Overrides {
    /// Directory containing pyproject.toml
    #[arg(long, short = 'C', global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Dependency groups to exclude (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub without: Vec<String>,

    /// Optional dependency groups to include (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub with: Vec<String>,

    /// Only include these dependency groups (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Install dependencies on the host even if a docker table is configured
    #[arg(long, global = true, conflicts_with = "container")]
    pub local: bool,

    /// Install dependencies in the configured container
    #[arg(long, global = true)]
    pub container: bool,
}

impl Overrides {
    /// Load the project configuration with these flags applied.
    pub(crate) fn load(&self) -> anyhow::Result<LambdaBuildConfig> {
        let config = LambdaBuildConfig::load(&self.project_dir)?;
        Ok(self.apply(config))
    }

    /// Load and resolve the configuration in one step.
    pub(crate) fn resolve(&self) -> anyhow::Result<BuildParameters> {
        Ok(self.load()?.resolve(&self.project_dir)?)
    }

    fn apply(&self, mut config: LambdaBuildConfig) -> LambdaBuildConfig {
        if !self.without.is_empty() {
            config.without = self.without.clone();
        }
        if !self.with.is_empty() {
            config.with = self.with.clone();
        }
        if !self.only.is_empty() {
            config.only = self.only.clone();
        }
        if self.local {
            config.in_container = Some(false);
        } else if self.container {
            config.in_container = Some(true);
        }
        config
    }
}
