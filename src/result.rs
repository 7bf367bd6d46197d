//! Measurement result types.

use crate::io_stats::IoCounters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one chunked rewrite of the target file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Requested file size in bytes.
    pub file_size: u64,
    /// Chunk size of the measured rewrite.
    pub write_unit: u64,
    /// Bytes the kernel wrote to storage during the rewrite.
    pub write_bytes: u64,
    /// Bytes the kernel read from storage during the rewrite.
    pub read_bytes: u64,
    /// Number of chunks issued.
    pub chunks: u64,
    /// Wall time of the rewrite.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Evictor used before the rewrite.
    pub evictor: String,
    /// Set when a counter snapshot fell back to zeros.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl MeasurementResult {
    pub fn new(file_size: u64, write_unit: u64, delta: IoCounters) -> Self {
        Self {
            file_size,
            write_unit,
            write_bytes: delta.write_bytes,
            read_bytes: delta.read_bytes,
            chunks: 0,
            duration: Duration::ZERO,
            evictor: String::new(),
            degraded: false,
        }
    }

    /// Physical bytes written per logical byte written.
    pub fn amplification(&self) -> Option<f64> {
        if self.file_size == 0 {
            return None;
        }
        Some(self.write_bytes as f64 / self.file_size as f64)
    }

    /// Logical rewrite throughput.
    pub fn bytes_per_sec(&self) -> Option<f64> {
        let secs = self.duration.as_secs_f64();
        (secs > 0.0).then(|| self.file_size as f64 / secs)
    }

    /// The single result line printed on success.
    pub fn to_line(&self) -> String {
        format!(
            "file_size {} write_unit {} write_bytes {} read_bytes {}",
            self.file_size, self.write_unit, self.write_bytes, self.read_bytes
        )
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_nanos().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let nanos = u128::deserialize(d)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}
