//! Exponentially weighted moving average rate estimator.
//!
//! Accumulates marks in an `uncounted` bucket and, on each [`Ewma::tick`],
//! converts the bucket into an instantaneous events-per-second rate which is
//! folded into the running rate with a fixed smoothing factor. Tick cadence
//! is the caller's responsibility; [`super::Meter`] drives it on a 5-second
//! boundary.

use std::time::Duration;

use parking_lot::Mutex;

/// Tick cadence driven by meters.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct EwmaState {
    rate: f64,
    uncounted: u64,
    initialized: bool,
}

/// A moving average whose older observations decay geometrically.
///
/// `alpha = 1 - exp(-interval / window)`; the first tick seeds the rate
/// directly from the observed instantaneous rate since there is no history
/// to decay.
#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    interval_secs: f64,
    state: Mutex<EwmaState>,
}

impl Ewma {
    /// Create an EWMA over an arbitrary decay window and tick interval.
    pub fn new(window: Duration, interval: Duration) -> Self {
        let interval_secs = interval.as_secs_f64();
        let alpha = 1.0 - (-interval_secs / window.as_secs_f64()).exp();
        Self {
            alpha,
            interval_secs,
            state: Mutex::new(EwmaState { rate: 0.0, uncounted: 0, initialized: false }),
        }
    }

    /// One-minute moving average at the standard 5-second tick.
    pub fn one_minute() -> Self {
        Self::new(Duration::from_secs(60), TICK_INTERVAL)
    }

    /// Five-minute moving average at the standard 5-second tick.
    pub fn five_minutes() -> Self {
        Self::new(Duration::from_secs(300), TICK_INTERVAL)
    }

    /// Fifteen-minute moving average at the standard 5-second tick.
    pub fn fifteen_minutes() -> Self {
        Self::new(Duration::from_secs(900), TICK_INTERVAL)
    }

    /// Record `n` occurrences into the current tick interval.
    pub fn update(&self, n: u64) {
        self.state.lock().uncounted += n;
    }

    /// Fold the pending interval into the rate.
    ///
    /// Callers must invoke this once per elapsed tick interval; skipped
    /// intervals must each get their own call so decay reflects true
    /// elapsed time.
    pub fn tick(&self) {
        let mut state = self.state.lock();
        let instant_rate = state.uncounted as f64 / self.interval_secs;
        state.uncounted = 0;

        if state.initialized {
            state.rate += self.alpha * (instant_rate - state.rate);
        } else {
            state.rate = instant_rate;
            state.initialized = true;
        }
    }

    /// Current rate in events per second.
    pub fn rate(&self) -> f64 {
        self.state.lock().rate
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for instruments::ewma.
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Validates the first-tick seeding rule: 60 events over a 60-second
    /// interval with a 60-second window yields exactly 1.0 events/second.
    #[test]
    fn test_first_tick_seeds_rate() {
        let ewma = Ewma::new(Duration::from_secs(60), Duration::from_secs(60));
        ewma.update(60);
        ewma.tick();
        assert!(close(ewma.rate(), 1.0));
    }

    /// Validates the decay fold: after seeding at 1.0, an empty tick decays
    /// the rate by the smoothing factor rather than zeroing it.
    #[test]
    fn test_subsequent_tick_decays() {
        let ewma = Ewma::new(Duration::from_secs(60), Duration::from_secs(5));
        ewma.update(60);
        ewma.tick();
        let seeded = ewma.rate();
        assert!(close(seeded, 12.0)); // 60 events / 5s interval

        ewma.tick();
        let alpha = 1.0 - (-5.0f64 / 60.0).exp();
        assert!(close(ewma.rate(), seeded + alpha * (0.0 - seeded)));
    }

    /// Validates a tick with no prior update still produces a valid zero rate.
    #[test]
    fn test_tick_before_update_is_zero() {
        let ewma = Ewma::one_minute();
        ewma.tick();
        assert_eq!(ewma.rate(), 0.0);
    }

    #[test]
    fn test_rate_before_any_tick_is_zero() {
        let ewma = Ewma::five_minutes();
        ewma.update(1000);
        assert_eq!(ewma.rate(), 0.0);
    }

    /// Validates the standard window constants against the reference
    /// smoothing factors (1 - exp(-5/window)).
    #[test]
    fn test_standard_window_alphas() {
        let m1 = Ewma::one_minute();
        let m5 = Ewma::five_minutes();
        let m15 = Ewma::fifteen_minutes();

        assert!(close(m1.alpha, 1.0 - (-5.0f64 / 60.0).exp()));
        assert!(close(m5.alpha, 1.0 - (-5.0f64 / 300.0).exp()));
        assert!(close(m15.alpha, 1.0 - (-5.0f64 / 900.0).exp()));
    }
}
