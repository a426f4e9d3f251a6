use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Source `{}` is not a directory", .path.display())]
    SourceNotDirectory { path: PathBuf },

    #[error("Destination `{}` is not a directory", .path.display())]
    DestinationNotDirectory { path: PathBuf },
}

#[derive(Debug)]
pub struct ParseLogFormatError(pub String);

impl std::error::Error for ParseLogFormatError {}

impl std::fmt::Display for ParseLogFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown log format: {} (expected `text` or `json`)", self.0)
    }
}
