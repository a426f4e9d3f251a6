//! The single consumer that owns the tar + gzip stream.

use std::io::Write;

use crossbeam_channel::Receiver;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;

use crate::error::{ArchiveError, FileError};
use crate::payload::PayloadReader;
use crate::report::{ArchiveEvent, Reporter};
use crate::worker::{ArchiveUnit, WorkUnit};

/// Statistics from a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Entries written, including zero-filled ones.
    pub files_archived: u64,
    /// Files that could not be opened, prepared or read.
    pub files_failed: u64,
    /// Entries zero-filled because the source shrank.
    pub files_padded: u64,
    /// Payload bytes taken from source files.
    pub bytes_archived: u64,
}

/// Writes `(header, payload)` pairs into a tar stream inside a gzip stream
/// inside `W`.
///
/// Layers are closed innermost first: tar trailer, then gzip trailer, then the
/// sink is flushed. [`ArchiveWriter::finish`] does this explicitly; if the
/// writer is dropped instead (an error path), `tar::Builder` and `GzEncoder`
/// still write their trailers from their own `Drop` impls, in the same order.
pub struct ArchiveWriter<W: Write> {
    builder: Builder<GzEncoder<W>>,
    summary: ArchiveSummary,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(sink: W, level: u32) -> ArchiveWriter<W> {
        let encoder = GzEncoder::new(sink, Compression::new(level));

        ArchiveWriter {
            builder: Builder::new(encoder),
            summary: ArchiveSummary::default(),
        }
    }

    /// Consume units until every sender is gone, then finalize the stream.
    ///
    /// A failure to write the stream returns at once. Dropping `units` closes
    /// the queue, so workers stop on their next send and the walk stops on the
    /// one after. Queued units are dropped with it, closing their files.
    pub fn drain(
        mut self,
        units: Receiver<WorkUnit>,
        reporter: &dyn Reporter,
    ) -> Result<(W, ArchiveSummary), ArchiveError> {
        for unit in units.iter() {
            match unit {
                WorkUnit::Archive(unit) => {
                    if let Err(err) = self.append(unit, reporter) {
                        tracing::error!(
                            error = %err,
                            "archive stream failed; discarding remaining files"
                        );
                        return Err(err);
                    }
                }
                WorkUnit::Failure(failed) => {
                    self.summary.files_failed += 1;
                    reporter.report(ArchiveEvent::FileFailed {
                        path: failed.path,
                        error: failed.error,
                    });
                }
            }
        }

        self.finish()
    }

    /// Write one unit's header and payload, then close its file.
    ///
    /// Source-side problems are reported and counted; only failures of the
    /// archive stream itself are returned.
    pub fn append(
        &mut self,
        unit: ArchiveUnit,
        reporter: &dyn Reporter,
    ) -> Result<(), ArchiveError> {
        let ArchiveUnit {
            file,
            mut header,
            name,
            path,
        } = unit;

        let size = header
            .entry_size()
            .map_err(|source| ArchiveError::WriteArchive { source })?;
        let mut payload = PayloadReader::new(file, size);

        self.builder
            .append_data(&mut header, &name, &mut payload)
            .map_err(|source| ArchiveError::WriteArchive { source })?;

        // Closes the source file.
        let outcome = payload.finish();

        self.summary.files_archived += 1;
        self.summary.bytes_archived += outcome.copied;

        match outcome.error {
            Some(source) => {
                self.summary.files_failed += 1;
                reporter.report(ArchiveEvent::FileFailed {
                    path: Some(path.clone()),
                    error: FileError::Read { path, source },
                });
            }
            None if outcome.padded > 0 => {
                self.summary.files_padded += 1;
                reporter.report(ArchiveEvent::FilePadded {
                    name,
                    missing: outcome.padded,
                });
            }
            None => {
                reporter.report(ArchiveEvent::FileArchived {
                    name,
                    size: outcome.copied,
                });
            }
        }

        Ok(())
    }

    /// Write the tar trailer, finish the gzip stream and flush the sink.
    pub fn finish(self) -> Result<(W, ArchiveSummary), ArchiveError> {
        let ArchiveWriter { builder, summary } = self;

        let encoder = builder
            .into_inner()
            .map_err(|source| ArchiveError::FinishArchive { source })?;
        let mut sink = encoder
            .finish()
            .map_err(|source| ArchiveError::FinishArchive { source })?;
        sink.flush()
            .map_err(|source| ArchiveError::FinishArchive { source })?;

        Ok((sink, summary))
    }
}
