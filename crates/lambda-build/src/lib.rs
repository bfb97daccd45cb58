//! Build orchestration for serverless deployment artifacts.
//!
//! # Pipelines
//!
//! ```text
//! create_separate_layer_package     create_separated_function_package     create_package
//!   1. Export  ── poetry export         (no export)                         1. Export
//!   2. Install ── container | local     1. Install ── no-deps, local        2. Install ── container | local
//!   3. Package ── zip layer root        2. Package ── zip, no excludes      3. Install ── no-deps, local
//!                                                                           4. Package ── zip merged root
//! ```
//!
//! Every pipeline works in a fresh temporary directory that is removed when
//! the pipeline returns, successfully or not. The artifact's parent
//! directories are created only right before packaging.
//!
//! # Container installs
//!
//! The requirements file is copied to `/requirements.txt`, dependencies are
//! installed into the fixed [`CONTAINER_CACHE_DIR`], and that directory is
//! copied back into the working tree. Local installs write straight into
//! the working tree instead.
//!
//! # Archive root
//!
//! The configured install directory (e.g. `python`) is kept as a prefix inside
//! the zip: the archive is rooted at the installed path with that suffix
//! removed, see [`archive::archive_root`].

pub mod archive;
pub mod command;
pub mod error;
pub mod pipeline;

pub use archive::{ArchiveAssembler, ZipAssembler};
pub use error::BuildError;
pub use pipeline::{
    BuildReport, BuildStage, Builder, CONTAINER_CACHE_DIR, CONTAINER_REQUIREMENTS_PATH,
};
