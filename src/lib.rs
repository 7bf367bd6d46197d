//! # pagecache-write
//!
//! Measures how many bytes the kernel actually writes to storage when a
//! large file is rewritten through the page cache in fixed-size chunks.
//!
//! A run creates a temporary file, reserves it on disk with
//! `posix_fallocate`, fills it once, evicts it from the page cache, and then
//! rewrites it from offset 0 in chunks of the requested write unit while the
//! process I/O counters (`/proc/self/io`) are read before and after. The
//! difference is the physical traffic caused by the rewrite.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagecache_write::{Measurement, MeasureConfig};
//!
//! let config = MeasureConfig::new().file_size(64 * 1024 * 1024);
//! let result = Measurement::new(config)
//!     .run(16 * 1024, &mut std::io::stdout())
//!     .unwrap();
//!
//! println!("amplification: {:.2}", result.amplification().unwrap_or_default());
//! ```
//!
//! The eviction step and the counter source are traits
//! ([`CacheDropper`], [`ProcessIoStatsReader`]) so they can be swapped out.

mod allocate;
mod config;
mod context;
mod error;
mod evict;
mod harness;
mod io_stats;
mod report;
mod result;
mod temp_file;
mod writer;

pub use allocate::{fallocate, init_file, page_size, DEFAULT_FILL_PAGES};
pub use config::{MeasureConfig, OutputFormat, DEFAULT_FILE_SIZE};
pub use context::MeasureContext;
pub use error::{MeasureError, Result, FAILURE_EXIT_CODE};
pub use evict::{CacheDropper, EvictorKind, FadviseDropper, NoopDropper, VmtouchDropper};
pub use harness::{Measurement, Stage};
pub use io_stats::{parse_proc_io, IoCounters, ProcIoReader, ProcessIoStatsReader};
pub use report::{ConsoleReporter, JsonReporter, Reporter};
pub use result::MeasurementResult;
pub use temp_file::TargetFile;
pub use writer::{random_buffer, write_all_retrying, write_chunks, write_file, WriteStats};
