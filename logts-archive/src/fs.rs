//! Filesystem helpers for naming and creating the output archive.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::ArchiveError;

pub const ARCHIVE_PREFIX: &str = "logts";
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// `logts_<basename>-<YYYYMMDD>-<HHMMSS>.tar.gz`
pub fn archive_file_name(source: &Path, at: NaiveDateTime) -> String {
    format!(
        "{}_{}-{}.{}",
        ARCHIVE_PREFIX,
        source_basename(source),
        at.format("%Y%m%d-%H%M%S"),
        ARCHIVE_EXTENSION
    )
}

/// Last component of `source`, resolving `.`, `..` and the like through the
/// canonical path. The filesystem root has no name and becomes `root`.
pub fn source_basename(source: &Path) -> String {
    let named = |path: &Path| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
    };

    named(source)
        .or_else(|| source.canonicalize().ok().and_then(|p| named(&p)))
        .unwrap_or_else(|| "root".to_string())
}

/// Where the archive goes when no destination is given: next to the source
/// directory, so it is never written into the tree being archived.
pub fn default_destination(source: &Path) -> PathBuf {
    let source = source
        .canonicalize()
        .unwrap_or_else(|_| source.to_path_buf());

    match source.parent() {
        Some(parent) => parent.to_path_buf(),
        None => source,
    }
}

/// Create the archive file, refusing to overwrite an existing one.
pub fn create_archive_file(path: &Path) -> Result<File, ArchiveError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => ArchiveError::ArchiveExists {
                path: path.to_path_buf(),
            },
            _ => ArchiveError::CreateArchive {
                path: path.to_path_buf(),
                source,
            },
        })
}
