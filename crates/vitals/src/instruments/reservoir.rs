//! Bounded statistically-representative samples of unbounded streams.
//!
//! Two strategies back histograms:
//!
//! - [`UniformReservoir`]: every element of the stream has equal probability
//!   of being in the final sample (Vitter's algorithm R).
//! - [`ExponentiallyDecayingReservoir`]: recent elements are exponentially
//!   more likely to be retained, so long-running processes report recent
//!   behavior instead of their full history.
//!
//! Selection randomness is never cryptographic; constructors accept a seed
//! so tests can fix the sampling sequence.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::Clock;
use crate::error::{MetricError, MetricResult};

/// Default sample size of the decaying reservoir.
pub const DEFAULT_CAPACITY: usize = 1028;
/// Default decay factor of the decaying reservoir.
pub const DEFAULT_ALPHA: f64 = 0.015;

const RESCALE_INTERVAL_SECS: f64 = 3600.0;

/// A bounded holder of sampled values.
///
/// `snapshot` returns the currently retained sample (never longer than the
/// capacity, never mutated by the read); only the magnitudes matter to the
/// statistics derived from it.
pub trait Reservoir: Send + Sync {
    /// Offer a value from the stream.
    fn update(&self, value: f64);

    /// The currently retained sample.
    fn snapshot(&self) -> Vec<f64>;

    /// Number of values currently retained.
    fn len(&self) -> usize;

    /// Whether the reservoir holds no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Uniform sampling
// ============================================================================

#[derive(Debug)]
struct UniformState {
    values: Vec<f64>,
    seen: u64,
    rng: StdRng,
}

/// Classic reservoir sampling: each stream element is retained with equal
/// probability `capacity / seen`.
#[derive(Debug)]
pub struct UniformReservoir {
    capacity: usize,
    state: Mutex<UniformState>,
}

impl UniformReservoir {
    /// Create a uniform reservoir holding up to `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> MetricResult<Self> {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Create a uniform reservoir with a fixed random seed.
    ///
    /// Given the same seed, the selection sequence is fully determined by
    /// the sequence of updates.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidCapacity`] when `capacity` is zero.
    pub fn with_seed(capacity: usize, seed: u64) -> MetricResult<Self> {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> MetricResult<Self> {
        if capacity == 0 {
            return Err(MetricError::InvalidCapacity { what: "reservoir" });
        }
        Ok(Self {
            capacity,
            state: Mutex::new(UniformState {
                values: Vec::with_capacity(capacity),
                seen: 0,
                rng,
            }),
        })
    }
}

impl Reservoir for UniformReservoir {
    fn update(&self, value: f64) {
        let mut state = self.state.lock();
        state.seen += 1;
        if state.values.len() < self.capacity {
            state.values.push(value);
        } else {
            // Replace a uniformly random slot with probability capacity/seen.
            let seen = state.seen;
            let slot = state.rng.gen_range(0..seen);
            if (slot as usize) < self.capacity {
                state.values[slot as usize] = value;
            }
        }
    }

    fn snapshot(&self) -> Vec<f64> {
        self.state.lock().values.clone()
    }

    fn len(&self) -> usize {
        self.state.lock().values.len()
    }
}

// ============================================================================
// Forward-decaying sampling
// ============================================================================

/// Total order over sample priorities. Priorities are finite and positive,
/// so `total_cmp` agrees with the numeric order.
#[derive(Debug, Clone, Copy)]
struct Priority(f64);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug)]
struct DecayingState {
    values: BTreeMap<Priority, f64>,
    start_time: f64,
    next_rescale: f64,
    rng: StdRng,
}

/// Forward-decaying priority sample.
///
/// Each inserted value is scored `exp(alpha * (t - t0)) / draw` with `draw`
/// uniform in (0, 1]; the lowest-scored entry is evicted when the table is
/// over capacity, which biases the retained set toward recent insertions.
/// An hourly rescale resets `t0` and scales every stored priority by the
/// same factor so weights never overflow while relative recency is
/// preserved.
pub struct ExponentiallyDecayingReservoir {
    capacity: usize,
    alpha: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<DecayingState>,
}

impl ExponentiallyDecayingReservoir {
    /// Create a decaying reservoir with explicit capacity and decay factor.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize, alpha: f64, clock: Arc<dyn Clock>) -> MetricResult<Self> {
        Self::with_rng(capacity, alpha, clock, StdRng::from_entropy())
    }

    /// Create a decaying reservoir with the reference defaults
    /// (capacity 1028, alpha 0.015).
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        let start = clock.epoch_secs();
        Self {
            capacity: DEFAULT_CAPACITY,
            alpha: DEFAULT_ALPHA,
            clock,
            state: Mutex::new(DecayingState {
                values: BTreeMap::new(),
                start_time: start,
                next_rescale: start + RESCALE_INTERVAL_SECS,
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// Create a decaying reservoir with a fixed random seed for tests.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidCapacity`] when `capacity` is zero.
    pub fn with_seed(
        capacity: usize,
        alpha: f64,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> MetricResult<Self> {
        Self::with_rng(capacity, alpha, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        capacity: usize,
        alpha: f64,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> MetricResult<Self> {
        if capacity == 0 {
            return Err(MetricError::InvalidCapacity { what: "reservoir" });
        }
        let start = clock.epoch_secs();
        Ok(Self {
            capacity,
            alpha,
            clock,
            state: Mutex::new(DecayingState {
                values: BTreeMap::new(),
                start_time: start,
                next_rescale: start + RESCALE_INTERVAL_SECS,
                rng,
            }),
        })
    }

    fn rescale_if_needed(&self, state: &mut DecayingState, now: f64) {
        if now < state.next_rescale {
            return;
        }
        let old_start = state.start_time;
        state.start_time = now;
        state.next_rescale = now + RESCALE_INTERVAL_SECS;

        // Same factor for every entry keeps relative ordering intact.
        let factor = (-self.alpha * (now - old_start)).exp();
        let rescaled: BTreeMap<Priority, f64> = state
            .values
            .iter()
            .map(|(priority, &value)| (Priority(priority.0 * factor), value))
            .collect();
        state.values = rescaled;
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn update(&self, value: f64) {
        let now = self.clock.epoch_secs();
        let mut state = self.state.lock();
        self.rescale_if_needed(&mut state, now);

        let weight = (self.alpha * (now - state.start_time)).exp();
        // Uniform draw in (0, 1]; gen() is [0, 1).
        let draw: f64 = 1.0 - state.rng.gen::<f64>();
        let priority = Priority(weight / draw);

        if state.values.len() < self.capacity {
            state.values.insert(priority, value);
        } else if let Some((&lowest, _)) = state.values.first_key_value() {
            if priority > lowest {
                state.values.insert(priority, value);
                while state.values.len() > self.capacity {
                    state.values.pop_first();
                }
            }
        }
    }

    fn snapshot(&self) -> Vec<f64> {
        self.state.lock().values.values().copied().collect()
    }

    fn len(&self) -> usize {
        self.state.lock().values.len()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for instruments::reservoir.
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;

    fn sorted(mut values: Vec<f64>) -> Vec<f64> {
        values.sort_by(f64::total_cmp);
        values
    }

    /// Validates that a uniform reservoir below capacity retains exactly the
    /// values it was fed.
    #[test]
    fn test_uniform_retains_all_below_capacity() {
        let reservoir = UniformReservoir::with_seed(3, 7).expect("capacity is positive");
        reservoir.update(1.0);
        reservoir.update(2.0);
        reservoir.update(3.0);

        assert_eq!(reservoir.len(), 3);
        assert_eq!(sorted(reservoir.snapshot()), vec![1.0, 2.0, 3.0]);
    }

    /// Validates the over-capacity contract: size stays at capacity and the
    /// sample is a subset of all inputs.
    #[test]
    fn test_uniform_over_capacity_is_subset() {
        let reservoir = UniformReservoir::with_seed(3, 7).expect("capacity is positive");
        for v in [1.0, 2.0, 3.0, 4.0] {
            reservoir.update(v);
        }

        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 3);
        for value in snapshot {
            assert!((1.0..=4.0).contains(&value));
        }
    }

    /// Validates that a seeded uniform reservoir is fully deterministic.
    #[test]
    fn test_uniform_seeded_determinism() {
        let a = UniformReservoir::with_seed(10, 99).expect("capacity is positive");
        let b = UniformReservoir::with_seed(10, 99).expect("capacity is positive");
        for i in 0..1000 {
            a.update(f64::from(i));
            b.update(f64::from(i));
        }
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(UniformReservoir::new(0).is_err());
        let clock = Arc::new(ManualClock::at_epoch());
        assert!(ExponentiallyDecayingReservoir::new(0, DEFAULT_ALPHA, clock).is_err());
    }

    /// Validates that the decaying reservoir keeps everything until capacity
    /// and stays bounded after.
    #[test]
    fn test_decaying_bounded_at_capacity() {
        let clock = Arc::new(ManualClock::at_epoch());
        let reservoir = ExponentiallyDecayingReservoir::with_seed(100, DEFAULT_ALPHA, clock, 3)
            .expect("capacity is positive");

        for i in 0..100 {
            reservoir.update(f64::from(i));
        }
        assert_eq!(reservoir.len(), 100);

        for i in 100..1000 {
            reservoir.update(f64::from(i));
        }
        assert_eq!(reservoir.len(), 100);

        for value in reservoir.snapshot() {
            assert!((0.0..1000.0).contains(&value));
        }
    }

    /// Validates recency bias: after a long quiet gap, newly inserted values
    /// displace the bulk of the old sample.
    #[test]
    fn test_decaying_favors_recent_values() {
        let clock = Arc::new(ManualClock::at_epoch());
        let reservoir = ExponentiallyDecayingReservoir::with_seed(
            10,
            DEFAULT_ALPHA,
            Arc::clone(&clock) as Arc<dyn Clock>,
            42,
        )
        .expect("capacity is positive");

        for _ in 0..10 {
            reservoir.update(0.0);
        }
        // 15 simulated minutes later the old weights are ~exp(-13.5) of the
        // new ones.
        clock.advance(Duration::from_secs(900));
        for _ in 0..50 {
            reservoir.update(1.0);
        }

        let snapshot = reservoir.snapshot();
        let recent = snapshot.iter().filter(|v| **v == 1.0).count();
        assert!(recent >= 9, "expected recent values to dominate, got {recent}/10");
    }

    /// Validates that rescaling preserves the retained sample's values while
    /// resetting the weight origin.
    #[test]
    fn test_rescale_preserves_sample() {
        let clock = Arc::new(ManualClock::at_epoch());
        let reservoir = ExponentiallyDecayingReservoir::with_seed(
            10,
            DEFAULT_ALPHA,
            Arc::clone(&clock) as Arc<dyn Clock>,
            42,
        )
        .expect("capacity is positive");

        for v in [1.0, 2.0, 3.0] {
            reservoir.update(v);
        }

        // Cross the hourly rescale boundary; the next update triggers it.
        clock.advance(Duration::from_secs(2 * 3600));
        reservoir.update(4.0);

        let snapshot = sorted(reservoir.snapshot());
        assert_eq!(snapshot, vec![1.0, 2.0, 3.0, 4.0]);
    }

    /// Validates that snapshots do not mutate the reservoir.
    #[test]
    fn test_snapshot_is_pure_read() {
        let reservoir = UniformReservoir::with_seed(5, 1).expect("capacity is positive");
        reservoir.update(9.0);
        let first = reservoir.snapshot();
        let second = reservoir.snapshot();
        assert_eq!(first, second);
        assert_eq!(reservoir.len(), 1);
    }
}
