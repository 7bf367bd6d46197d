//! Error types for the measurement pipeline.

use std::io;
use std::path::PathBuf;

/// Exit status used for every failure, the `-1` of a C `main` as seen by the shell.
pub const FAILURE_EXIT_CODE: i32 = 255;

/// Errors that abort a measurement run.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    /// Bad invocation; nothing has been created yet.
    #[error("usage: {0}")]
    Usage(String),

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `posix_fallocate` refused the reservation.
    #[error("posix_fallocate of {size} bytes failed: {source}")]
    Allocate {
        size: u64,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("failed to rewind target file: {0}")]
    Seek(#[source] io::Error),

    /// The per-process I/O accounting source could not be read or parsed.
    #[error("process I/O counters unavailable: {0}")]
    Counters(String),

    #[error("failed to report result: {0}")]
    Report(#[source] io::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MeasureError>;
