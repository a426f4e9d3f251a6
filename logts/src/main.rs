use std::path::{Path, PathBuf};

use anyhow::Context;
use logts_archive::{archive_directory, ArchiveOptions, ArchiveReport, TracingReporter};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

mod error;

use error::{CliError, ParseLogFormatError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn parse_log_format(src: &str) -> std::result::Result<LogFormat, ParseLogFormatError> {
    let format = match src {
        "text" | "pretty" => LogFormat::Text,
        "json" => LogFormat::Json,
        _ => return Err(ParseLogFormatError(src.to_string())),
    };

    Ok(format)
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "logts",
    about = "Compress a directory tree into a timestamped .tar.gz archive."
)]
struct CliOpts {
    #[structopt(long, parse(from_os_str), help = "Directory to archive")]
    from: PathBuf,

    #[structopt(
        long,
        parse(from_os_str),
        help = "Directory to write the archive into [default: parent of --from]"
    )]
    to: Option<PathBuf>,

    #[structopt(
        short = "j",
        long,
        default_value = "4",
        help = "Number of worker threads reading files"
    )]
    workers: usize,

    #[structopt(
        short = "l",
        long,
        default_value = "6",
        help = "gzip compression level, 0 (store) to 9 (best)"
    )]
    level: u32,

    #[structopt(short, long, help = "Show per-file output")]
    verbose: bool,

    #[structopt(
        long,
        parse(try_from_str = parse_log_format),
        default_value = "text",
        help = "Log output format: text or json"
    )]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat, verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn validate(from: &Path, to: Option<&Path>) -> std::result::Result<(), CliError> {
    if !from.is_dir() {
        return Err(CliError::SourceNotDirectory {
            path: from.to_path_buf(),
        });
    }

    if let Some(to) = to {
        if !to.is_dir() {
            return Err(CliError::DestinationNotDirectory {
                path: to.to_path_buf(),
            });
        }
    }

    Ok(())
}

fn run(opts: &CliOpts) -> anyhow::Result<ArchiveReport> {
    validate(&opts.from, opts.to.as_deref())?;

    let options = ArchiveOptions::default()
        .workers(opts.workers)
        .compression_level(opts.level);

    archive_directory(&opts.from, opts.to.as_deref(), options, &TracingReporter)
        .with_context(|| format!("Failed to archive `{}`", opts.from.display()))
}

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());
    init_logging(opts.log_format, opts.verbose);

    match run(&opts) {
        Ok(report) => {
            let summary = &report.summary;
            if summary.files_failed > 0 {
                tracing::warn!(
                    failed = summary.files_failed,
                    "some files could not be archived"
                );
            }
            println!(
                "{}: {} files, {} archived, {} failed",
                report.path.display(),
                summary.files_archived,
                humansize::format_size(summary.bytes_archived, humansize::BINARY),
                summary.files_failed
            );
        }
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "archiving failed");
            eprintln!("{:?}", e);
            std::process::exit(1);
        }
    }
}
