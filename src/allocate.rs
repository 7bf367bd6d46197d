//! On-disk pre-allocation and initial fill of the target file.

use crate::error::{MeasureError, Result};
use crate::temp_file::TargetFile;
use crate::writer::{self, WriteStats};
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Pages per block used for the initial fill.
pub const DEFAULT_FILL_PAGES: usize = 32;

const FALLBACK_PAGE_SIZE: usize = 4096;

/// System page size, or 4 KiB when `sysconf` cannot tell.
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

/// Reserve `len` bytes of physical storage for `file` starting at offset 0.
pub fn fallocate(file: &File, len: u64) -> Result<()> {
    let off_len = libc::off_t::try_from(len).map_err(|_| MeasureError::Allocate {
        size: len,
        source: io::Error::new(io::ErrorKind::InvalidInput, "size exceeds off_t"),
    })?;
    // posix_fallocate returns the error number instead of setting errno.
    let ret = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, off_len) };
    if ret != 0 {
        return Err(MeasureError::Allocate {
            size: len,
            source: io::Error::from_raw_os_error(ret),
        });
    }
    Ok(())
}

/// Allocate the full target size and overwrite it once with random data in
/// blocks of `fill_pages` pages, leaving the offset back at zero.
///
/// Without the full write some extents may stay unwritten or sparse, which
/// the filesystem handles specially on the measured rewrite.
pub fn init_file(target: &mut TargetFile, fill_pages: usize) -> Result<WriteStats> {
    let size = target.size();
    fallocate(target.file(), size)?;
    tracing::debug!(size, "allocated target file");

    let block = (fill_pages.max(1) * page_size()) as u64;
    let stats = writer::write_file(target, block, size).map_err(MeasureError::Write)?;
    tracing::debug!(block, chunks = stats.chunks, "filled target file");

    target.rewind()?;
    Ok(stats)
}
