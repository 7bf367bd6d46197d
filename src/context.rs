//! Counter bracketing around the measured operation.

use crate::error::Result;
use crate::io_stats::{IoCounters, ProcessIoStatsReader};
use std::time::{Duration, Instant};

/// Takes an [`IoCounters`] snapshot before and after a closure and times it.
///
/// When the counter source fails the context either propagates the error
/// (`strict`) or substitutes zeros, logs a warning and marks the run
/// degraded.
pub struct MeasureContext<'a> {
    reader: &'a dyn ProcessIoStatsReader,
    strict: bool,
    pub(crate) before: Option<IoCounters>,
    pub(crate) after: Option<IoCounters>,
    pub(crate) duration: Option<Duration>,
    pub(crate) degraded: bool,
}

impl<'a> MeasureContext<'a> {
    pub fn new(reader: &'a dyn ProcessIoStatsReader, strict: bool) -> Self {
        Self {
            reader,
            strict,
            before: None,
            after: None,
            duration: None,
            degraded: false,
        }
    }

    /// Read the counters once, applying the fallback policy.
    pub fn snapshot(&mut self) -> Result<IoCounters> {
        match self.reader.read() {
            Ok(c) => Ok(c),
            Err(e) if !self.strict => {
                tracing::warn!(error = %e, "using zero I/O counters; result will be misleading");
                self.degraded = true;
                Ok(IoCounters::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Run `f` between two snapshots. Everything outside `f` is not counted.
    ///
    /// The closure's own error is returned as is; the second snapshot is only
    /// taken when `f` succeeds.
    pub fn measure<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let before = self.snapshot()?;
        self.before = Some(before);
        tracing::debug!(?before, "baseline counters");

        let start = Instant::now();
        let value = f()?;
        self.duration = Some(start.elapsed());

        let after = self.snapshot()?;
        self.after = Some(after);
        tracing::debug!(?after, "final counters");
        Ok(value)
    }

    /// Counter delta of the last [`measure`](Self::measure) call.
    ///
    /// Zero once any snapshot fell back to substituted counters.
    pub fn delta(&self) -> IoCounters {
        if self.degraded {
            return IoCounters::default();
        }
        match (self.before, self.after) {
            (Some(b), Some(a)) => a.since(&b),
            _ => IoCounters::default(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration.unwrap_or_default()
    }

    pub fn degraded(&self) -> bool {
        self.degraded
    }
}
