//! Per-process storage I/O counters from `/proc/<pid>/io`.

use crate::error::{MeasureError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cumulative bytes the kernel attributes to the process as actually read
/// from and written to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl IoCounters {
    /// Traffic between `earlier` and `self`.
    ///
    /// Counters never decrease within a process, so saturation only guards
    /// against snapshots passed in the wrong order.
    pub fn since(&self, earlier: &IoCounters) -> IoCounters {
        IoCounters {
            read_bytes: self.read_bytes.saturating_sub(earlier.read_bytes),
            write_bytes: self.write_bytes.saturating_sub(earlier.write_bytes),
        }
    }
}

/// Source of [`IoCounters`] snapshots.
pub trait ProcessIoStatsReader {
    fn read(&self) -> Result<IoCounters>;
}

/// Reads the procfs I/O accounting file.
#[derive(Debug, Clone)]
pub struct ProcIoReader {
    path: PathBuf,
}

impl ProcIoReader {
    /// Counters of the calling process.
    pub fn current() -> Self {
        Self::with_path("/proc/self/io")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcIoReader {
    fn default() -> Self {
        Self::current()
    }
}

impl ProcessIoStatsReader for ProcIoReader {
    fn read(&self) -> Result<IoCounters> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| MeasureError::Counters(format!("{}: {}", self.path.display(), e)))?;
        parse_proc_io(&text)
    }
}

/// Parse the `read_bytes:` and `write_bytes:` lines of a `/proc/<pid>/io`
/// dump. Other fields (`rchar`, `cancelled_write_bytes`, ...) are ignored.
pub fn parse_proc_io(text: &str) -> Result<IoCounters> {
    let mut read_bytes = None;
    let mut write_bytes = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "read_bytes" => &mut read_bytes,
            "write_bytes" => &mut write_bytes,
            _ => continue,
        };
        let parsed = value
            .trim()
            .parse::<u64>()
            .map_err(|e| MeasureError::Counters(format!("bad {} value '{}': {}", key, value.trim(), e)))?;
        *slot = Some(parsed);
    }

    match (read_bytes, write_bytes) {
        (Some(read_bytes), Some(write_bytes)) => Ok(IoCounters {
            read_bytes,
            write_bytes,
        }),
        _ => Err(MeasureError::Counters(
            "read_bytes/write_bytes fields missing".to_string(),
        )),
    }
}
