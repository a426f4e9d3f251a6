//! Run events and the collaborator that receives them.

use std::path::PathBuf;

use crate::error::FileError;
use crate::writer::ArchiveSummary;

/// Something worth telling the outside world about during a run.
#[derive(Debug)]
pub enum ArchiveEvent {
    /// A run started.
    Started {
        source: PathBuf,
        destination: PathBuf,
    },
    /// A file was written to the archive in full.
    FileArchived { name: PathBuf, size: u64 },
    /// A file shrank after it was enumerated; its entry was zero-filled to
    /// the recorded size.
    FilePadded { name: PathBuf, missing: u64 },
    /// A file could not be archived. The run carries on without it.
    FileFailed {
        path: Option<PathBuf>,
        error: FileError,
    },
    /// The archive stream was finalized. `destination` is unset when the
    /// pipeline wrote to a sink with no path.
    Finished {
        source: PathBuf,
        destination: Option<PathBuf>,
        summary: ArchiveSummary,
    },
}

/// Receives [`ArchiveEvent`]s for a single run.
///
/// Only the coordinating thread and the writer thread report, never the
/// workers, so implementations see events in archive order.
pub trait Reporter: Send + Sync {
    fn report(&self, event: ArchiveEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: ArchiveEvent) {
        match event {
            ArchiveEvent::Started {
                source,
                destination,
            } => {
                tracing::info!(
                    src = %source.display(),
                    dest = %destination.display(),
                    "started archiving"
                );
            }
            ArchiveEvent::FileArchived { name, size } => {
                tracing::debug!(file = %name.display(), size, "file archived");
            }
            ArchiveEvent::FilePadded { name, missing } => {
                tracing::warn!(
                    file = %name.display(),
                    missing,
                    "file shrank while archiving; padded with zeros"
                );
            }
            ArchiveEvent::FileFailed { path, error } => {
                let file = path.map(|p| p.display().to_string()).unwrap_or_default();
                tracing::error!(
                    file = %file,
                    error = %error,
                    cause = %source_message(&error),
                    "error processing file"
                );
            }
            ArchiveEvent::Finished {
                source,
                destination,
                summary,
            } => {
                let dest = destination
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                tracing::info!(
                    src = %source.display(),
                    dest = %dest,
                    files = summary.files_archived,
                    failed = summary.files_failed,
                    padded = summary.files_padded,
                    bytes = summary.bytes_archived,
                    "ended process"
                );
            }
        }
    }
}

fn source_message(error: &FileError) -> String {
    std::error::Error::source(error)
        .map(ToString::to_string)
        .unwrap_or_default()
}
