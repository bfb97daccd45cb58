use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "container install requested but no [tool.lambda-build.docker] table is configured; \
         add one with at least `image`, or build with --local"
    )]
    MissingContainerConfig,

    #[error("failed to resolve project directory {path}")]
    ProjectDirResolve {
        path: PathBuf,
        source: std::io::Error,
    },
}
