//! The coordinator wiring enumerator, worker pool and writer together.
//!
//! ```text
//!  caller thread           worker threads             writer thread
//!  Enumerator --tasks--> [ open + header ] x N --units--> ArchiveWriter --> tar/gz/sink
//! ```
//!
//! Both queues are bounded, so a slow writer eventually blocks the workers,
//! and the workers eventually block the walk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use chrono::Local;
use crossbeam_channel::{bounded, Sender};

use crate::error::ArchiveError;
use crate::fs::{archive_file_name, create_archive_file, default_destination};
use crate::report::{ArchiveEvent, Reporter};
use crate::walk::{Enumerator, FileTask};
use crate::worker::{WorkUnit, WorkerPool};
use crate::writer::{ArchiveSummary, ArchiveWriter};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

const WRITER_THREAD: &str = "logts-writer";

/// Options for an archiving run.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Number of worker threads opening files. Zero is treated as one.
    pub workers: usize,
    /// Capacity of each of the two queues. Defaults to twice the worker count.
    pub queue_capacity: Option<usize>,
    /// gzip level from 0 (store) to 9 (best). Larger values are capped at 9.
    pub compression_level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ArchiveOptions {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.effective_workers() * 2)
            .max(1)
    }

    pub fn effective_compression_level(&self) -> u32 {
        self.compression_level.min(9)
    }
}

/// Where an archive was written and what went into it.
#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub summary: ArchiveSummary,
}

/// Runs one source directory through the enumerator, worker pool and writer.
pub struct ArchivePipeline<'r> {
    options: ArchiveOptions,
    reporter: &'r dyn Reporter,
    output: Option<PathBuf>,
}

impl<'r> ArchivePipeline<'r> {
    pub fn new(options: ArchiveOptions, reporter: &'r dyn Reporter) -> ArchivePipeline<'r> {
        ArchivePipeline {
            options,
            reporter,
            output: None,
        }
    }

    /// The file the archive is being written to. It is left out of the walk
    /// even if it lies inside the source, and named in the `Finished` event.
    pub fn output_path<P: Into<PathBuf>>(mut self, path: P) -> ArchivePipeline<'r> {
        self.output = Some(path.into());
        self
    }

    /// Archive every regular file below `source` into `sink`.
    ///
    /// The stream is finalized and `sink` flushed before this returns, whatever
    /// the outcome, so the caller still owns a complete (possibly partial)
    /// archive. On an enumeration error it holds the files dispatched before
    /// the error; per-file failures are only reported.
    pub fn run<W: Write + Send>(
        &self,
        source: &Path,
        sink: &mut W,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let workers = self.options.effective_workers();
        let capacity = self.options.effective_queue_capacity();
        let level = self.options.effective_compression_level();
        let reporter = self.reporter;

        tracing::debug!(
            src = %source.display(),
            workers,
            capacity,
            level,
            "starting pipeline"
        );

        let (walked, written) = thread::scope(|scope| {
            let (task_tx, task_rx) = bounded::<FileTask>(capacity);
            let (unit_tx, unit_rx) = bounded::<WorkUnit>(capacity);

            let writer = ArchiveWriter::new(sink, level);
            let writer = thread::Builder::new()
                .name(WRITER_THREAD.to_string())
                .spawn_scoped(scope, move || writer.drain(unit_rx, reporter))
                .map_err(|source| ArchiveError::SpawnThread {
                    name: WRITER_THREAD.to_string(),
                    source,
                })?;

            let pool = WorkerPool::spawn(scope, workers, task_rx, unit_tx)?;

            // Dropping the sender at the end of the walk closes the intake.
            let walked = self.dispatch(source, task_tx);

            let pooled = pool.join();
            let written = writer.join().map_err(|_| ArchiveError::ThreadPanicked {
                name: WRITER_THREAD.to_string(),
            })?;
            pooled?;

            Ok::<_, ArchiveError>((walked, written))
        })?;

        let (_, summary) = written?;
        reporter.report(ArchiveEvent::Finished {
            source: source.to_path_buf(),
            destination: self.output.clone(),
            summary: summary.clone(),
        });

        walked?;
        Ok(summary)
    }

    fn dispatch(&self, source: &Path, tasks: Sender<FileTask>) -> Result<(), ArchiveError> {
        let walk = Enumerator::new(source).skip_path(self.output.clone());
        let mut dispatched = 0u64;

        for task in walk {
            let task = task?;
            if tasks.send(task).is_err() {
                tracing::warn!("worker pool stopped early; ending enumeration");
                break;
            }
            dispatched += 1;
        }

        tracing::debug!(files = dispatched, "enumeration finished");
        Ok(())
    }
}

/// Archive `source` into `<destination>/logts_<name>-<YYYYMMDD>-<HHMMSS>.tar.gz`.
///
/// Without a destination the archive is placed next to the source directory.
pub fn archive_directory(
    source: &Path,
    destination: Option<&Path>,
    options: ArchiveOptions,
    reporter: &dyn Reporter,
) -> Result<ArchiveReport, ArchiveError> {
    let source = source
        .canonicalize()
        .map_err(|err| ArchiveError::ResolveSource {
            path: source.to_path_buf(),
            source: err,
        })?;

    let destination = match destination {
        Some(dir) => dir
            .canonicalize()
            .map_err(|source| ArchiveError::CreateArchive {
                path: dir.to_path_buf(),
                source,
            })?,
        None => default_destination(&source),
    };

    let path = destination.join(archive_file_name(&source, Local::now().naive_local()));

    reporter.report(ArchiveEvent::Started {
        source: source.clone(),
        destination: path.clone(),
    });

    let mut sink = BufWriter::new(create_archive_file(&path)?);
    let pipeline = ArchivePipeline::new(options, reporter).output_path(path.clone());
    let result = pipeline.run(&source, &mut sink);

    // A partial archive left by an enumeration error is synced as well.
    let synced = sync_archive(sink);
    let summary = result?;
    synced?;

    Ok(ArchiveReport { path, summary })
}

fn sync_archive(sink: BufWriter<File>) -> Result<(), ArchiveError> {
    let file = sink
        .into_inner()
        .map_err(|err| ArchiveError::FinishArchive {
            source: err.into_error(),
        })?;

    file.sync_all()
        .map_err(|source| ArchiveError::FinishArchive { source })
}
