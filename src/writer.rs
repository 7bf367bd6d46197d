//! Chunked writes with short-write and `EINTR` continuation.

use rand::RngCore;
use std::io::{self, Write};

/// Totals from one [`write_chunks`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Number of chunks handed to the writer.
    pub chunks: u64,
    /// Bytes written across all chunks.
    pub bytes: u64,
}

/// Build a buffer of `len` random bytes.
///
/// The content does not matter for the measurement; it only has to be
/// something the filesystem cannot store as a hole or a zero extent.
pub fn random_buffer(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Write the whole of `buf`, continuing after short writes and retrying
/// calls interrupted by a signal.
///
/// Any other error aborts immediately. A writer that accepts zero bytes of
/// a non-empty buffer is reported as [`io::ErrorKind::WriteZero`].
pub fn write_all_retrying<W: Write + ?Sized>(w: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "writer accepted zero bytes",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Write exactly `total` bytes from the writer's current position, reusing
/// `buf` for every chunk.
///
/// Chunks are `buf.len()` bytes except the last, which carries the remainder.
pub fn write_chunks<W: Write + ?Sized>(w: &mut W, buf: &[u8], total: u64) -> io::Result<WriteStats> {
    if buf.is_empty() && total > 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "chunk size must be positive",
        ));
    }

    let unit = buf.len() as u64;
    let mut stats = WriteStats::default();
    let mut offset = 0u64;
    while offset < total {
        let n = unit.min(total - offset) as usize;
        write_all_retrying(w, &buf[..n])?;
        offset += n as u64;
        stats.chunks += 1;
        stats.bytes += n as u64;
    }
    Ok(stats)
}

/// Fill a fresh random buffer of `unit` bytes and write `total` bytes with it.
///
/// The buffer is capped at `total` so an oversized unit does not allocate
/// more than the file can take.
pub fn write_file<W: Write + ?Sized>(w: &mut W, unit: u64, total: u64) -> io::Result<WriteStats> {
    let len = unit.min(total).max(1);
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "write unit too large"))?;
    let buf = random_buffer(len);
    tracing::trace!(unit, total, buffer = buf.len(), "writing file in chunks");
    write_chunks(w, &buf, total)
}
