//! Time source abstraction for deterministic testing.
//!
//! Every instrument that observes time (meters, timers, decaying reservoirs,
//! events, reporters) takes an injected [`Clock`] so tests can advance time
//! manually instead of sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use vitals::clock::{Clock, ManualClock, SystemClock};
//!
//! let clock = SystemClock;
//! let _now = clock.now();
//!
//! let manual = ManualClock::new();
//! let start = manual.now();
//! manual.advance(Duration::from_secs(5));
//! assert_eq!(manual.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Trait for time operations used by instruments and reporters.
pub trait Clock: Send + Sync {
    /// Current monotonic instant, suitable for measuring durations.
    fn now(&self) -> Instant;

    /// Current wall-clock time.
    fn system_time(&self) -> SystemTime;

    /// Seconds since the UNIX epoch as a float.
    ///
    /// Used for decaying-reservoir weights and reporter timestamps.
    fn epoch_secs(&self) -> f64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
    }
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// The clock starts at the current real time; `advance` moves both the
/// monotonic and wall-clock readings forward without real time passing.
/// Clones share the same elapsed state.
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    base_system_time: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a manual clock anchored at the current real time.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            base_system_time: SystemTime::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Create a manual clock whose wall clock starts at the UNIX epoch.
    ///
    /// Handy for asserting exact reporter timestamps.
    pub fn at_epoch() -> Self {
        Self {
            start: Instant::now(),
            base_system_time: UNIX_EPOCH,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Set the total elapsed time to an absolute value.
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Total simulated time since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + *self.elapsed.lock()
    }
}
