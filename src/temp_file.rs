//! Scoped temporary target file.

use crate::error::{MeasureError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// The file under measurement.
///
/// Created exclusively under a timestamped name and removed when dropped,
/// whichever way the owning scope exits.
#[derive(Debug)]
pub struct TargetFile {
    // Field order matters: the handle is closed before the guard unlinks.
    file: File,
    guard: RemoveOnDrop,
    size: u64,
}

/// Unlinks its path when dropped.
#[derive(Debug)]
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = %self.0.display(), "removed target file"),
            Err(e) => tracing::warn!(path = %self.0.display(), error = %e, "failed to remove target file"),
        }
    }
}

impl TargetFile {
    /// Create `<dir>/<microseconds since epoch>.tmp` for writing.
    pub fn create(dir: &Path, size: u64) -> Result<Self> {
        let path = dir.join(timestamped_name());
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o666)
            .open(&path)
            .map_err(|source| MeasureError::Open {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), size, "created target file");
        Ok(Self {
            file,
            guard: RemoveOnDrop(path),
            size,
        })
    }

    /// Location of the file on disk.
    pub fn path(&self) -> &Path {
        &self.guard.0
    }

    /// Target size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The open handle.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The open handle, for seeking and writing.
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Move the file offset back to zero.
    pub fn rewind(&mut self) -> Result<()> {
        let offset = self
            .file
            .seek(SeekFrom::Start(0))
            .map_err(MeasureError::Seek)?;
        debug_assert_eq!(offset, 0);
        Ok(())
    }
}

impl Write for TargetFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn timestamped_name() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    format!("{}.tmp", micros)
}
