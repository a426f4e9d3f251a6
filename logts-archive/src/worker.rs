//! Worker pool: opens files and prepares their tar headers in parallel.
//!
//! Workers never touch the archive stream. Each [`FileTask`] turns into
//! exactly one [`WorkUnit`], which is handed to the single writer.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tar::{EntryType, Header, HeaderMode};

use crate::error::{ArchiveError, FileError};
use crate::walk::FileTask;

/// An opened file and its header, ready to be appended to the archive.
///
/// Dropping the unit closes the file.
#[derive(Debug)]
pub struct ArchiveUnit {
    pub file: File,
    pub header: Header,
    pub name: PathBuf,
    pub path: PathBuf,
}

/// A task that could not be turned into an [`ArchiveUnit`].
#[derive(Debug)]
pub struct FailureUnit {
    pub error: FileError,
    pub path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum WorkUnit {
    Archive(ArchiveUnit),
    Failure(FailureUnit),
}

/// A fixed set of worker threads sharing one intake queue.
pub struct WorkerPool<'scope> {
    handles: Vec<(String, ScopedJoinHandle<'scope, ()>)>,
}

impl<'scope> WorkerPool<'scope> {
    /// Spawn `count` workers in `scope`. Each pulls from `tasks` until it is
    /// closed and drained, pushing results to `units`.
    pub fn spawn<'env>(
        scope: &'scope Scope<'scope, 'env>,
        count: usize,
        tasks: Receiver<FileTask>,
        units: Sender<WorkUnit>,
    ) -> Result<WorkerPool<'scope>, ArchiveError> {
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let name = format!("logts-worker-{}", id);
            let tasks = tasks.clone();
            let units = units.clone();

            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(scope, move || run(tasks, units))
                .map_err(|source| ArchiveError::SpawnThread {
                    name: name.clone(),
                    source,
                })?;

            handles.push((name, handle));
        }

        tracing::debug!(workers = count, "worker pool started");
        Ok(WorkerPool { handles })
    }

    /// Wait for every worker to exit.
    pub fn join(self) -> Result<(), ArchiveError> {
        let mut result = Ok(());

        for (name, handle) in self.handles {
            if handle.join().is_err() && result.is_ok() {
                result = Err(ArchiveError::ThreadPanicked { name });
            }
        }

        result
    }
}

fn run(tasks: Receiver<FileTask>, units: Sender<WorkUnit>) {
    for task in tasks.iter() {
        if units.send(prepare(task)).is_err() {
            // Writer is gone; nothing left to hand work to.
            break;
        }
    }
}

/// Open the task's file and build its header.
pub fn prepare(task: FileTask) -> WorkUnit {
    let file = match File::open(&task.path) {
        Ok(file) => file,
        Err(source) => {
            return WorkUnit::Failure(FailureUnit {
                path: Some(task.path.clone()),
                error: FileError::Open {
                    path: task.path,
                    source,
                },
            })
        }
    };

    match build_header(&task) {
        Ok(header) => WorkUnit::Archive(ArchiveUnit {
            file,
            header,
            name: task.name,
            path: task.path,
        }),
        Err(error) => {
            drop(file);
            WorkUnit::Failure(FailureUnit {
                error,
                path: Some(task.path),
            })
        }
    }
}

/// Build a GNU tar header from the task's metadata snapshot.
///
/// The entry name itself is attached by the writer, which can emit a
/// long-name record when it does not fit the header.
pub fn build_header(task: &FileTask) -> Result<Header, FileError> {
    check_entry_name(&task.name)?;

    if !task.metadata.is_file() {
        return Err(FileError::Header {
            name: task.name.clone(),
            reason: "not a regular file",
        });
    }

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&task.metadata, HeaderMode::Complete);
    header.set_entry_type(EntryType::Regular);
    header.set_size(task.metadata.len());

    Ok(header)
}

fn check_entry_name(name: &Path) -> Result<(), FileError> {
    let reason = if name.as_os_str().is_empty() {
        Some("empty entry name")
    } else if name.has_root() {
        Some("absolute entry name")
    } else if name
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        Some("entry name must only contain normal components")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(FileError::Header {
            name: name.to_path_buf(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn task(root: &Path, name: &str) -> FileTask {
        let path = root.join(name);
        FileTask {
            metadata: fs::metadata(&path).unwrap(),
            path,
            name: PathBuf::from(name),
        }
    }

    #[test]
    fn prepare_opens_file_and_fills_header() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("app.log"), b"line one\nline two\n").unwrap();

        match prepare(task(tmp.path(), "app.log")) {
            WorkUnit::Archive(unit) => {
                assert_eq!(unit.name, Path::new("app.log"));
                assert_eq!(unit.header.size().unwrap(), 18);
                assert_eq!(unit.header.entry_type(), EntryType::Regular);
                assert!(unit.header.mtime().unwrap() > 0);
            }
            WorkUnit::Failure(failure) => panic!("unexpected failure: {}", failure.error),
        }
    }

    #[test]
    fn missing_file_becomes_failure() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("gone.log"), b"soon gone").unwrap();
        let task = task(tmp.path(), "gone.log");
        fs::remove_file(&task.path).unwrap();

        match prepare(task) {
            WorkUnit::Failure(FailureUnit {
                error: FileError::Open { path, .. },
                path: origin,
            }) => {
                assert_eq!(path, tmp.path().join("gone.log"));
                assert_eq!(origin, Some(path));
            }
            other => panic!("expected open failure, got {:?}", other),
        }
    }

    #[test]
    fn bad_entry_name_becomes_header_failure() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("file"), b"x").unwrap();
        let mut task = task(tmp.path(), "file");
        task.name = PathBuf::from("../escape");

        assert!(matches!(
            prepare(task),
            WorkUnit::Failure(FailureUnit {
                error: FileError::Header { .. },
                ..
            })
        ));
    }

    #[test]
    fn entry_name_rules() {
        assert!(check_entry_name(Path::new("a/b/c.txt")).is_ok());
        assert!(check_entry_name(Path::new("")).is_err());
        assert!(check_entry_name(Path::new("/etc/passwd")).is_err());
        assert!(check_entry_name(Path::new("a/../b")).is_err());
        assert!(check_entry_name(Path::new("./a")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn header_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.sh");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        let header = build_header(&task(tmp.path(), "run.sh")).unwrap();
        assert_eq!(header.mode().unwrap() & 0o777, 0o750);
    }
}
