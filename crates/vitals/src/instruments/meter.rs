//! Event-rate instrument: throughput since start plus 1/5/15-minute EWMAs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::instruments::ewma::{Ewma, TICK_INTERVAL};

#[derive(Debug)]
struct MeterState {
    count: u64,
    start: Instant,
    last_tick: Instant,
}

/// Measures the rate at which events occur.
///
/// Exposes the mean rate since creation and three exponentially weighted
/// moving averages over 1-, 5- and 15-minute windows. EWMA ticks run on a
/// fixed 5-second cadence: a meter that goes quiet catches up by folding in
/// one tick per missed boundary, so the decay reflects true elapsed time.
pub struct Meter {
    clock: Arc<dyn Clock>,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    state: Mutex<MeterState>,
}

impl Meter {
    /// Create a meter reading time from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            m1: Ewma::one_minute(),
            m5: Ewma::five_minutes(),
            m15: Ewma::fifteen_minutes(),
            state: Mutex::new(MeterState { count: 0, start: now, last_tick: now }),
        }
    }

    /// Record one event.
    pub fn mark(&self) {
        self.mark_by(1);
    }

    /// Record `n` events.
    pub fn mark_by(&self, n: u64) {
        self.state.lock().count += n;
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
        self.tick_if_necessary();
    }

    /// Total events recorded.
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Mean events per second since the meter was created.
    pub fn mean_rate(&self) -> f64 {
        let (count, start) = {
            let state = self.state.lock();
            (state.count, state.start)
        };
        let elapsed = self.clock.now().duration_since(start).as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        count as f64 / elapsed
    }

    /// One-minute moving average, events per second.
    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    /// Five-minute moving average, events per second.
    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    /// Fifteen-minute moving average, events per second.
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }

    /// Point-in-time view of all rates.
    pub fn snapshot(&self) -> MeterSnapshot {
        self.tick_if_necessary();
        MeterSnapshot {
            count: self.count(),
            mean_rate: self.mean_rate(),
            m1_rate: self.m1.rate(),
            m5_rate: self.m5.rate(),
            m15_rate: self.m15.rate(),
        }
    }

    /// Fold in one EWMA tick per 5-second boundary crossed since the last
    /// tick. Never compresses a long gap into a single tick.
    fn tick_if_necessary(&self) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let age = now.duration_since(state.last_tick);
        if age < TICK_INTERVAL {
            return;
        }
        let intervals = age.as_nanos() / TICK_INTERVAL.as_nanos();
        let intervals = u64::try_from(intervals).unwrap_or(u64::MAX);
        state.last_tick += Duration::from_secs(5 * intervals);
        for _ in 0..intervals {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter").field("count", &self.count()).finish_non_exhaustive()
    }
}

/// Immutable view of a meter's rates, all in events per second.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeterSnapshot {
    /// Total events recorded.
    pub count: u64,
    /// Mean rate since the meter was created.
    pub mean_rate: f64,
    /// One-minute EWMA rate.
    pub m1_rate: f64,
    /// Five-minute EWMA rate.
    pub m5_rate: f64,
    /// Fifteen-minute EWMA rate.
    pub m15_rate: f64,
}
