//! Duration instrument: a meter over call rate plus a histogram over
//! elapsed time, recorded in nanoseconds.

use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::instruments::histogram::{Histogram, HistogramSnapshot};
use crate::instruments::meter::{Meter, MeterSnapshot};
use crate::instruments::reservoir::Reservoir;

/// Measures the rate and duration distribution of an operation.
///
/// Durations land in the histogram as nanoseconds; callers rescale for
/// display. A scoped measurement started with [`Timer::start`] records its
/// elapsed time on every exit path, including panics, exactly once.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use vitals::clock::SystemClock;
/// use vitals::instruments::Timer;
///
/// let timer = Timer::new(Arc::new(SystemClock));
/// let answer = timer.time(|| 6 * 7);
/// assert_eq!(answer, 42);
/// assert_eq!(timer.count(), 1);
/// ```
pub struct Timer {
    meter: Meter,
    histogram: Histogram,
    clock: Arc<dyn Clock>,
    slow_call_threshold: Option<Duration>,
}

impl Timer {
    /// Create a timer over a default forward-decaying reservoir.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: Meter::new(Arc::clone(&clock)),
            histogram: Histogram::forward_decaying(Arc::clone(&clock)),
            clock,
            slow_call_threshold: None,
        }
    }

    /// Create a timer over an explicit reservoir.
    pub fn with_reservoir(clock: Arc<dyn Clock>, reservoir: Box<dyn Reservoir>) -> Self {
        Self {
            meter: Meter::new(Arc::clone(&clock)),
            histogram: Histogram::new(reservoir),
            clock,
            slow_call_threshold: None,
        }
    }

    /// Log a `tracing::warn!` whenever a recorded duration exceeds
    /// `threshold`.
    #[must_use]
    pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
        self.slow_call_threshold = Some(threshold);
        self
    }

    /// Record an explicit duration. Never fails.
    pub fn update(&self, duration: Duration) {
        self.histogram.update(duration.as_nanos() as f64);
        self.meter.mark();

        if let Some(threshold) = self.slow_call_threshold {
            if duration > threshold {
                tracing::warn!(
                    elapsed_ms = duration.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "timed call exceeded slow-call threshold"
                );
            }
        }
    }

    /// Begin a scoped measurement.
    ///
    /// The returned guard records elapsed time when stopped or dropped,
    /// whichever comes first.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard { timer: self, started: Some(self.clock.now()) }
    }

    /// Time a closure, recording on every exit path.
    ///
    /// A panic raised by the closure is not suppressed; the measurement is
    /// recorded before it propagates.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.start();
        f()
    }

    /// Number of measurements recorded.
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Point-in-time rates and duration distribution.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot { rate: self.meter.snapshot(), duration: self.histogram.snapshot() }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer").field("count", &self.count()).finish_non_exhaustive()
    }
}

/// In-flight scoped measurement.
///
/// Transitions running -> recorded exactly once: `stop` records and
/// disarms; dropping an armed guard records as well.
#[must_use = "a timer guard records its measurement when stopped or dropped"]
#[derive(Debug)]
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    started: Option<Instant>,
}

impl TimerGuard<'_> {
    /// Record the elapsed time and return it.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        match self.started.take() {
            Some(started) => {
                let elapsed = self.timer.clock.now().duration_since(started);
                self.timer.update(elapsed);
                elapsed
            }
            None => Duration::ZERO,
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.record();
    }
}

/// Immutable merged view of a timer's meter and histogram.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerSnapshot {
    /// Call-rate fields (count plus mean/m1/m5/m15 rates).
    pub rate: MeterSnapshot,
    /// Duration distribution in nanoseconds.
    pub duration: HistogramSnapshot,
}

#[cfg(test)]
mod tests {
    //! Unit tests for instruments::timer.
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::clock::ManualClock;

    fn timer_with_clock() -> (Timer, ManualClock) {
        let clock = ManualClock::at_epoch();
        let timer = Timer::new(Arc::new(clock.clone()));
        (timer, clock)
    }

    /// Validates the explicit update path records nanoseconds.
    #[test]
    fn test_update_records_nanoseconds() {
        let (timer, _clock) = timer_with_clock();
        timer.update(Duration::from_millis(5));

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.rate.count, 1);
        assert_eq!(snapshot.duration.max(), 5_000_000.0);
    }

    /// Validates the scoped guard measures elapsed clock time.
    #[test]
    fn test_guard_measures_elapsed() {
        let (timer, clock) = timer_with_clock();

        let guard = timer.start();
        clock.advance(Duration::from_millis(250));
        let elapsed = guard.stop();

        assert_eq!(elapsed, Duration::from_millis(250));
        assert_eq!(timer.count(), 1);
    }

    /// Validates running -> recorded happens exactly once even though `stop`
    /// is followed by the guard's drop.
    #[test]
    fn test_guard_records_exactly_once() {
        let (timer, clock) = timer_with_clock();
        {
            let guard = timer.start();
            clock.advance(Duration::from_millis(10));
            let _ = guard.stop();
        }
        assert_eq!(timer.count(), 1);
    }

    /// Validates the drop path: a guard that is never stopped still records.
    #[test]
    fn test_guard_records_on_drop() {
        let (timer, clock) = timer_with_clock();
        {
            let _guard = timer.start();
            clock.advance(Duration::from_millis(3));
        }
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().duration.max(), 3_000_000.0);
    }

    /// Validates pass-through failure handling: a panicking operation is
    /// still measured (count 1, 5ms sample) and the panic propagates.
    #[test]
    fn test_panicking_operation_is_recorded() {
        let (timer, clock) = timer_with_clock();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            timer.time(|| {
                clock.advance(Duration::from_millis(5));
                panic!("wrapped operation failed");
            })
        }));
        assert!(result.is_err());

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.rate.count, 1);
        assert_eq!(snapshot.duration.max(), 5_000_000.0);
    }

    #[test]
    fn test_time_returns_closure_output() {
        let (timer, _clock) = timer_with_clock();
        let out = timer.time(|| "done");
        assert_eq!(out, "done");
        assert_eq!(timer.count(), 1);
    }
}
