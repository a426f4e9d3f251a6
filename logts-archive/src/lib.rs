//! Concurrent directory to `.tar.gz` archiving.
//!
//! An [`Enumerator`] walks the source tree on the calling thread and feeds a
//! bounded queue. A [`WorkerPool`] opens files and prepares their headers in
//! parallel. A single [`ArchiveWriter`] owns the tar and gzip streams and
//! appends entries in the order workers finish them. [`ArchivePipeline`] ties
//! these together; [`archive_directory`] adds output naming on top.
//!
//! One unreadable file never fails a run: it is reported through the
//! [`Reporter`] and left out. Enumeration and output errors end the run, but
//! the archive stream is still finalized first.

mod error;
pub mod fs;
mod payload;
mod pipeline;
mod report;
mod walk;
mod worker;
mod writer;

pub use error::{ArchiveError, FileError};
pub use payload::{PayloadOutcome, PayloadReader};
pub use pipeline::{
    archive_directory, ArchiveOptions, ArchivePipeline, ArchiveReport, DEFAULT_COMPRESSION_LEVEL,
    DEFAULT_WORKERS,
};
pub use report::{ArchiveEvent, Reporter, TracingReporter};
pub use walk::{entry_name, Enumerator, FileTask};
pub use worker::{build_header, prepare, ArchiveUnit, FailureUnit, WorkUnit, WorkerPool};
pub use writer::{ArchiveSummary, ArchiveWriter};
