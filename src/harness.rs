//! The measurement pipeline.
//!
//! A run walks a fixed sequence of stages:
//!
//! ```text
//! Start -> FileCreated -> Allocated -> Evicted -> BaselineMeasured
//!       -> Written -> FinalMeasured -> Reported -> CleanedUp
//! ```
//!
//! An error at any stage ends the run. The target file is owned by the stage
//! scope, so it is closed and unlinked on the way out either way.

use crate::allocate;
use crate::config::MeasureConfig;
use crate::context::MeasureContext;
use crate::error::{MeasureError, Result};
use crate::evict::CacheDropper;
use crate::io_stats::{ProcIoReader, ProcessIoStatsReader};
use crate::report::{self, Reporter};
use crate::result::MeasurementResult;
use crate::temp_file::TargetFile;
use crate::writer;
use std::io::Write;

/// Progress of a run, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    FileCreated,
    Allocated,
    Evicted,
    BaselineMeasured,
    Written,
    FinalMeasured,
    Reported,
    CleanedUp,
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = ?*stage, to = ?next, "stage");
    *stage = next;
}

/// A configured measurement with its environment capabilities.
///
/// # Example
///
/// ```rust,no_run
/// use pagecache_write::{Measurement, MeasureConfig};
///
/// let measurement = Measurement::new(MeasureConfig::from_env());
/// let result = measurement.run(4096, &mut std::io::stdout()).unwrap();
/// assert!(result.write_bytes > 0);
/// ```
pub struct Measurement {
    config: MeasureConfig,
    dropper: Box<dyn CacheDropper>,
    reader: Box<dyn ProcessIoStatsReader>,
    reporter: Box<dyn Reporter>,
}

impl Measurement {
    /// Capabilities follow the config: its evictor, its output format and
    /// the procfs counters of this process.
    pub fn new(config: MeasureConfig) -> Self {
        Self {
            dropper: config.evictor.build(),
            reader: Box::new(ProcIoReader::current()),
            reporter: report::for_format(config.format),
            config,
        }
    }

    /// Replace the cache evictor.
    pub fn with_dropper(mut self, dropper: impl CacheDropper + 'static) -> Self {
        self.dropper = Box::new(dropper);
        self
    }

    /// Replace the I/O counter source.
    pub fn with_reader(mut self, reader: impl ProcessIoStatsReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    /// Replace the result reporter.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Rewrite the target file in chunks of `write_unit` bytes, measure the
    /// storage traffic and report it to `out`.
    pub fn run(&self, write_unit: u64, out: &mut dyn Write) -> Result<MeasurementResult> {
        if write_unit == 0 {
            return Err(MeasureError::Usage("write unit must be positive".into()));
        }
        if self.config.file_size == 0 {
            return Err(MeasureError::Usage("file size must be positive".into()));
        }

        let mut stage = Stage::Start;
        let outcome = self.run_stages(write_unit, out, &mut stage);
        match &outcome {
            Ok(_) => advance(&mut stage, Stage::CleanedUp),
            Err(e) => tracing::error!(stage = ?stage, error = %e, "measurement failed"),
        }
        outcome
    }

    fn run_stages(
        &self,
        write_unit: u64,
        out: &mut dyn Write,
        stage: &mut Stage,
    ) -> Result<MeasurementResult> {
        let size = self.config.file_size;

        let mut target = TargetFile::create(&self.config.tmp_dir, size)?;
        advance(stage, Stage::FileCreated);

        allocate::init_file(&mut target, self.config.fill_pages)?;
        advance(stage, Stage::Allocated);

        if let Err(e) = self.dropper.drop_cache(target.path()) {
            tracing::warn!(
                evictor = self.dropper.name(),
                error = %e,
                "cache eviction failed; measurement may include cached pages"
            );
        }
        advance(stage, Stage::Evicted);

        let mut ctx = MeasureContext::new(self.reader.as_ref(), self.config.strict_counters);
        let stats = ctx.measure(|| {
            advance(stage, Stage::BaselineMeasured);
            let stats = writer::write_file(&mut target, write_unit, size).map_err(MeasureError::Write)?;
            advance(stage, Stage::Written);
            Ok(stats)
        })?;
        advance(stage, Stage::FinalMeasured);

        let mut result = MeasurementResult::new(size, write_unit, ctx.delta());
        result.chunks = stats.chunks;
        result.duration = ctx.duration();
        result.evictor = self.dropper.name().to_string();
        result.degraded = ctx.degraded();
        tracing::info!(
            write_unit,
            chunks = result.chunks,
            elapsed_ms = result.duration.as_millis() as u64,
            amplification = result.amplification().unwrap_or_default(),
            "rewrite measured"
        );

        self.reporter.report(&result, out).map_err(MeasureError::Report)?;
        advance(stage, Stage::Reported);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evict::NoopDropper;
    use crate::io_stats::IoCounters;
    use crate::report::JsonReporter;
    use std::cell::{Cell, RefCell};
    use std::io;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    const SIZE: u64 = 1 << 20;

    /// Each read advances both counters by a fixed step.
    struct SteppingReader {
        next: Cell<IoCounters>,
        step: IoCounters,
    }

    impl SteppingReader {
        fn new(step_read: u64, step_write: u64) -> Self {
            Self {
                next: Cell::new(IoCounters::default()),
                step: IoCounters {
                    read_bytes: step_read,
                    write_bytes: step_write,
                },
            }
        }
    }

    impl ProcessIoStatsReader for SteppingReader {
        fn read(&self) -> Result<IoCounters> {
            let current = self.next.get();
            self.next.set(IoCounters {
                read_bytes: current.read_bytes + self.step.read_bytes,
                write_bytes: current.write_bytes + self.step.write_bytes,
            });
            Ok(current)
        }
    }

    /// Fails the first read, then returns large lifetime totals.
    struct FailsFirstReader {
        reads: Cell<u32>,
    }

    impl ProcessIoStatsReader for FailsFirstReader {
        fn read(&self) -> Result<IoCounters> {
            let n = self.reads.get();
            self.reads.set(n + 1);
            if n == 0 {
                Err(MeasureError::Counters("transient".into()))
            } else {
                Ok(IoCounters {
                    read_bytes: 5_000_000_000,
                    write_bytes: 9_000_000_000,
                })
            }
        }
    }

    struct FailingReporter;

    impl Reporter for FailingReporter {
        fn report(&self, _result: &MeasurementResult, _out: &mut dyn Write) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    struct BrokenReader;

    impl ProcessIoStatsReader for BrokenReader {
        fn read(&self) -> Result<IoCounters> {
            Err(MeasureError::Counters("no procfs".into()))
        }
    }

    /// Records the paths it was asked to evict and whether they existed.
    #[derive(Clone, Default)]
    struct RecordingDropper {
        seen: Rc<RefCell<Vec<(PathBuf, u64)>>>,
        fail: bool,
    }

    impl CacheDropper for RecordingDropper {
        fn name(&self) -> &str {
            "recording"
        }

        fn drop_cache(&self, path: &Path) -> io::Result<()> {
            let len = std::fs::metadata(path)?.len();
            self.seen.borrow_mut().push((path.to_path_buf(), len));
            if self.fail {
                Err(io::Error::other("evictor missing"))
            } else {
                Ok(())
            }
        }
    }

    fn config(dir: &Path) -> MeasureConfig {
        MeasureConfig::new().file_size(SIZE).tmp_dir(dir).fill_pages(4)
    }

    fn leftover_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn should_report_counter_delta_when_run_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let dropper = RecordingDropper::default();
        let measurement = Measurement::new(config(dir.path()))
            .with_dropper(dropper.clone())
            .with_reader(SteppingReader::new(0, 2 * SIZE));

        let mut out = Vec::new();
        let result = measurement.run(4096, &mut out).unwrap();

        assert_eq!(result.file_size, SIZE);
        assert_eq!(result.write_unit, 4096);
        assert_eq!(result.write_bytes, 2 * SIZE);
        assert_eq!(result.read_bytes, 0);
        assert_eq!(result.chunks, SIZE / 4096);
        assert_eq!(result.evictor, "recording");
        assert!(!result.degraded);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            format!("file_size {} write_unit 4096 write_bytes {} read_bytes 0\n", SIZE, 2 * SIZE)
        );
    }

    #[test]
    fn should_evict_fully_allocated_file_before_measuring() {
        let dir = tempfile::tempdir().unwrap();
        let dropper = RecordingDropper::default();
        Measurement::new(config(dir.path()))
            .with_dropper(dropper.clone())
            .with_reader(SteppingReader::new(0, 0))
            .run(512, &mut io::sink())
            .unwrap();

        let seen = dropper.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, SIZE);
        assert!(seen[0].0.starts_with(dir.path()));
    }

    #[test]
    fn should_remove_target_file_when_run_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(0, 0))
            .run(1000, &mut io::sink())
            .unwrap();
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn should_continue_when_eviction_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dropper = RecordingDropper {
            fail: true,
            ..Default::default()
        };
        let result = Measurement::new(config(dir.path()))
            .with_dropper(dropper)
            .with_reader(SteppingReader::new(0, SIZE))
            .run(4096, &mut io::sink())
            .unwrap();
        assert_eq!(result.write_bytes, SIZE);
    }

    #[test]
    fn should_mark_degraded_when_counters_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .with_reader(BrokenReader)
            .run(4096, &mut io::sink())
            .unwrap();
        assert!(result.degraded);
        assert_eq!(result.write_bytes, 0);
        assert_eq!(result.read_bytes, 0);
    }

    #[test]
    fn should_report_zero_traffic_when_baseline_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let result = Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .with_reader(FailsFirstReader { reads: Cell::new(0) })
            .run(4096, &mut out)
            .unwrap();
        assert!(result.degraded);
        assert_eq!(result.write_bytes, 0);
        assert_eq!(result.read_bytes, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("file_size {} write_unit 4096 write_bytes 0 read_bytes 0\n", SIZE)
        );
    }

    #[test]
    fn should_reject_zero_file_size_without_creating_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Measurement::new(config(dir.path()).file_size(0))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(0, 0))
            .run(4096, &mut io::sink())
            .unwrap_err();
        assert!(matches!(err, MeasureError::Usage(_)));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn should_clean_up_when_allocation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Measurement::new(config(dir.path()).file_size(u64::MAX))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(0, 0))
            .run(4096, &mut io::sink())
            .unwrap_err();
        assert!(matches!(err, MeasureError::Allocate { .. }));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn should_clean_up_when_reporting_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(0, SIZE))
            .with_reporter(FailingReporter)
            .run(4096, &mut io::sink())
            .unwrap_err();
        assert!(matches!(err, MeasureError::Report(_)));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn should_fail_and_clean_up_when_strict_and_counters_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        let err = Measurement::new(config(dir.path()).strict_counters(true))
            .with_dropper(NoopDropper)
            .with_reader(BrokenReader)
            .run(4096, &mut out)
            .unwrap_err();
        assert!(matches!(err, MeasureError::Counters(_)));
        assert!(out.is_empty());
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn should_fail_when_tmp_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Measurement::new(config(&dir.path().join("missing")))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(0, 0))
            .run(4096, &mut io::sink())
            .unwrap_err();
        assert!(matches!(err, MeasureError::Open { .. }));
    }

    #[test]
    fn should_reject_zero_write_unit() {
        let dir = tempfile::tempdir().unwrap();
        let err = Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .run(0, &mut io::sink())
            .unwrap_err();
        assert!(matches!(err, MeasureError::Usage(_)));
        assert_eq!(leftover_files(dir.path()), 0);
    }

    #[test]
    fn should_issue_single_chunk_when_unit_exceeds_size() {
        let dir = tempfile::tempdir().unwrap();
        let result = Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(0, 0))
            .run(SIZE * 4, &mut io::sink())
            .unwrap();
        assert_eq!(result.chunks, 1);
        assert_eq!(result.write_unit, SIZE * 4);
    }

    #[test]
    fn should_emit_json_when_reporter_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        Measurement::new(config(dir.path()))
            .with_dropper(NoopDropper)
            .with_reader(SteppingReader::new(7, SIZE))
            .with_reporter(JsonReporter)
            .run(8192, &mut out)
            .unwrap();
        let parsed: MeasurementResult = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.read_bytes, 7);
        assert_eq!(parsed.chunks, SIZE / 8192);
    }

    /// Real procfs counters and vmtouch on a disk-backed /tmp.
    #[test]
    #[ignore]
    fn should_write_at_least_file_size_on_real_disk() {
        let measurement = Measurement::new(MeasureConfig::new());
        let result = measurement.run(4096, &mut io::sink()).unwrap();
        assert_eq!(result.file_size, 134217728);
        assert!(result.write_bytes >= result.file_size);
    }
}
