//! Lazy enumeration of the regular files below a source directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use jwalk::{Parallelism, WalkDir};

use crate::error::ArchiveError;

type Entries = Box<dyn Iterator<Item = Result<jwalk::DirEntry<((), ())>, jwalk::Error>>>;

/// A regular file found by the [`Enumerator`], ready to be handed to a worker.
#[derive(Debug)]
pub struct FileTask {
    /// Path to the file on the filesystem.
    pub path: PathBuf,
    /// Path relative to the source root, used as the entry name. Only normal
    /// components, kept as raw bytes so names need not be UTF-8.
    pub name: PathBuf,
    /// Metadata snapshot taken at enumeration time.
    pub metadata: fs::Metadata,
}

/// Walks a directory tree depth-first, lexically within each directory,
/// yielding one [`FileTask`] per regular file.
///
/// The first error ends the walk: it is yielded once and the iterator is
/// fused afterwards. Tasks yielded before the error remain valid.
pub struct Enumerator {
    root: PathBuf,
    entries: Entries,
    skip: Option<PathBuf>,
    finished: bool,
}

impl Enumerator {
    pub fn new<P: AsRef<Path>>(root: P) -> Enumerator {
        let root = root.as_ref().to_path_buf();
        let entries = WalkDir::new(&root)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(Parallelism::Serial)
            .into_iter();

        Enumerator {
            root,
            entries: Box::new(entries),
            skip: None,
            finished: false,
        }
    }

    /// Never yield `path`. Used to keep the archive being written out of itself.
    pub fn skip_path(mut self, path: Option<PathBuf>) -> Enumerator {
        self.skip = path;
        self
    }

    fn fail(&mut self, error: ArchiveError) -> Option<Result<FileTask, ArchiveError>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl Iterator for Enumerator {
    type Item = Result<FileTask, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            let mut entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return self.fail(ArchiveError::Enumerate {
                        path,
                        source: io::Error::from(err),
                    });
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                // jwalk attaches a failed listing to the directory's own entry.
                if let Some(err) = entry.read_children_error.take() {
                    return self.fail(ArchiveError::Enumerate {
                        path,
                        source: io::Error::from(err),
                    });
                }
                continue;
            }

            if entry.depth == 0 {
                return self.fail(ArchiveError::Enumerate {
                    path,
                    source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
                });
            }

            if self.skip.as_deref() == Some(path.as_path()) {
                tracing::debug!(file = %path.display(), "skipping archive being written");
                continue;
            }

            // Follows symlinks, so a link to a file is archived with the
            // target's size and content. A dangling link still gets a task;
            // opening it fails in the worker and only that file is lost.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(source) => match fs::symlink_metadata(&path) {
                    Ok(link) if link.file_type().is_symlink() => {
                        tracing::debug!(
                            file = %path.display(),
                            error = %source,
                            "dangling symlink"
                        );
                        link
                    }
                    _ => return self.fail(ArchiveError::Enumerate { path, source }),
                },
            };

            if metadata.is_dir() {
                continue;
            }

            if !metadata.is_file() && !metadata.file_type().is_symlink() {
                tracing::debug!(file = %path.display(), "skipping special file");
                continue;
            }

            let name = match entry_name(&self.root, &path) {
                Some(name) => name,
                None => return self.fail(ArchiveError::InvalidEntryPath { path }),
            };

            return Some(Ok(FileTask {
                path,
                name,
                metadata,
            }));
        }
    }
}

/// Name of `path` below `root`, made of normal components only.
///
/// The tar writer joins these with `/`, whatever the platform separator.
pub fn entry_name(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    let mut name = PathBuf::new();

    for component in relative.components() {
        match component {
            Component::Normal(part) => name.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if name.as_os_str().is_empty() {
        return None;
    }

    Some(name)
}
