use std::fs::File;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Python bytecode never belongs in a deployment archive.
pub const BYTECODE_EXCLUDES: [&str; 2] = ["*.pyc", "*__pycache__/*"];

/// Directory whose contents become the top level of the archive.
///
/// Removes exactly one trailing occurrence of `install_dir` from `installed`
/// so the install directory stays as a prefix inside the zip. An empty
/// `install_dir`, or one that `installed` does not end with, leaves the path
/// unchanged.
///
/// ```
/// # use std::path::Path;
/// # use lambda_build::archive::archive_root;
/// assert_eq!(
///     archive_root(Path::new("/tmp/w/layer_output/python"), "python"),
///     Path::new("/tmp/w/layer_output"),
/// );
/// assert_eq!(archive_root(Path::new("/tmp/w/out"), ""), Path::new("/tmp/w/out"));
/// assert_eq!(archive_root(Path::new("/tmp/w/./python"), "./python"), Path::new("/tmp/w"));
/// ```
pub fn archive_root(installed: &Path, install_dir: &str) -> PathBuf {
    let suffix: PathBuf = Path::new(install_dir)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let depth = suffix.components().count();
    if depth == 0 || !installed.ends_with(&suffix) {
        return installed.to_path_buf();
    }

    // `components` also drops interior `.` segments from `installed`.
    let kept = installed.components().count() - depth;
    installed.components().take(kept).collect()
}

/// Produces an archive from a directory tree.
pub trait ArchiveAssembler {
    /// Archive everything under `source_dir` into `output`, skipping files
    /// matched by any of `excludes`. The parent of `output` must exist.
    fn assemble(&self, source_dir: &Path, output: &Path, excludes: &[String])
    -> Result<(), ArchiveError>;
}

/// Deterministic zip writer.
///
/// Entries are added in file-name order with fixed timestamps, so identical
/// trees produce identical archives. The zip is staged next to `output` and
/// moved into place only once complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipAssembler;

impl ArchiveAssembler for ZipAssembler {
    fn assemble(
        &self,
        source_dir: &Path,
        output: &Path,
        excludes: &[String],
    ) -> Result<(), ArchiveError> {
        let patterns = excludes
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| ArchiveError::Pattern {
                    pattern: p.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !source_dir.is_dir() {
            return Err(ArchiveError::SourceMissing(source_dir.to_path_buf()));
        }

        let staging_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = NamedTempFile::new_in(staging_dir).map_err(|e| ArchiveError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;

        let mut zip = ZipWriter::new(staging.as_file());
        let mut written = 0usize;

        for entry in WalkDir::new(source_dir)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ArchiveError::Walk {
                path: source_dir.to_path_buf(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source_dir)
                // arch-lint: allow(no-silent-result-drop) reason="walkdir yields paths under its root"
                .unwrap_or(entry.path());
            let name = entry_name(relative);

            if patterns
                .iter()
                .any(|p| p.matches(&name) || p.matches_path(entry.path()))
            {
                tracing::trace!("excluding {name}");
                continue;
            }

            zip.start_file(name.as_str(), file_options(&entry)?)
                .map_err(|e| ArchiveError::Zip {
                    path: output.to_path_buf(),
                    source: e,
                })?;
            let mut file = File::open(entry.path()).map_err(|e| ArchiveError::Read {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            std::io::copy(&mut file, &mut zip).map_err(|e| ArchiveError::Write {
                path: output.to_path_buf(),
                source: e,
            })?;
            written += 1;
        }

        zip.finish().map_err(|e| ArchiveError::Zip {
            path: output.to_path_buf(),
            source: e,
        })?;
        staging.persist(output).map_err(|e| ArchiveError::Persist {
            path: output.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(files = written, "wrote {}", output.display());
        Ok(())
    }
}

/// Zip entry names always use `/`, whatever the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg_attr(not(unix), allow(unused_variables))]
fn file_options(entry: &walkdir::DirEntry) -> Result<SimpleFileOptions, ArchiveError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;

        let metadata = entry.metadata().map_err(|e| ArchiveError::Walk {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        options.unix_permissions(metadata.permissions().mode())
    };

    Ok(options)
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid exclude pattern {pattern:?}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("archive source {0} is not a directory")]
    SourceMissing(PathBuf),
    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write archive {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode zip archive {path}")]
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    #[error("failed to move archive into place at {path}")]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}
