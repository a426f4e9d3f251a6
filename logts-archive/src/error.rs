use std::path::PathBuf;

/// Errors that end an archiving run.
///
/// Everything here is terminal: the pipeline stops dispatching work, finalizes
/// whatever it has written so far and hands the error back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Cannot create archive `{}`", .path.display())]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive already exists: `{}`", .path.display())]
    ArchiveExists { path: PathBuf },

    #[error("Cannot resolve source directory `{}`", .path.display())]
    ResolveSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot enumerate `{}`", .path.display())]
    Enumerate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot represent `{}` as an archive entry name", .path.display())]
    InvalidEntryPath { path: PathBuf },

    #[error("Cannot write to archive stream")]
    WriteArchive {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot finish archive")]
    FinishArchive {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot spawn thread `{name}`")]
    SpawnThread {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Thread `{name}` panicked")]
    ThreadPanicked { name: String },
}

/// Errors scoped to a single file. These are reported and skipped, never
/// returned from the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Cannot open file `{}`", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot build archive header for `{}`: {reason}", .name.display())]
    Header {
        name: PathBuf,
        reason: &'static str,
    },

    #[error("Cannot read file `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
