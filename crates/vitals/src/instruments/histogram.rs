//! Value-distribution instrument backed by a sampling reservoir.

use std::sync::Arc;

use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::instruments::reservoir::{ExponentiallyDecayingReservoir, Reservoir};

/// Exact whole-stream aggregates, maintained on every update regardless of
/// whether the reservoir retains the value.
#[derive(Debug)]
struct StreamStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

/// Tracks the statistical distribution of a stream of values.
///
/// `min`, `max`, `sum` and `count` are exact over the full stream; the
/// quantile statistics are derived from the reservoir's retained sample.
///
/// # Examples
///
/// ```
/// use vitals::instruments::{Histogram, UniformReservoir};
///
/// let histogram = Histogram::new(Box::new(UniformReservoir::new(128)?));
/// for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
///     histogram.update(v);
/// }
///
/// let snapshot = histogram.snapshot();
/// assert_eq!(snapshot.mean(), 3.0);
/// assert_eq!(snapshot.median(), 3.0);
/// # Ok::<(), vitals::MetricError>(())
/// ```
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
    stats: Mutex<StreamStats>,
}

impl Histogram {
    /// Create a histogram over the given reservoir.
    pub fn new(reservoir: Box<dyn Reservoir>) -> Self {
        Self {
            reservoir,
            stats: Mutex::new(StreamStats {
                count: 0,
                sum: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            }),
        }
    }

    /// Create a histogram over a default forward-decaying reservoir.
    pub fn forward_decaying(clock: Arc<dyn Clock>) -> Self {
        Self::new(Box::new(ExponentiallyDecayingReservoir::with_defaults(clock)))
    }

    /// Record a value. Never fails.
    pub fn update(&self, value: f64) {
        {
            let mut stats = self.stats.lock();
            stats.count += 1;
            stats.sum += value;
            if value < stats.min {
                stats.min = value;
            }
            if value > stats.max {
                stats.max = value;
            }
        }
        self.reservoir.update(value);
    }

    /// Number of values recorded over the full stream.
    pub fn count(&self) -> u64 {
        self.stats.lock().count
    }

    /// Point-in-time distribution statistics.
    ///
    /// A pure read: safe to call concurrently with ongoing updates, and the
    /// exact aggregates (`count`, `sum`, extrema) are read jointly so they
    /// reflect the same set of applied updates.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let (count, sum, min, max) = {
            let stats = self.stats.lock();
            (stats.count, stats.sum, stats.min, stats.max)
        };
        let mut sample = self.reservoir.snapshot();
        sample.sort_by(f64::total_cmp);

        HistogramSnapshot {
            count,
            sum,
            min: if count == 0 { 0.0 } else { min },
            max: if count == 0 { 0.0 } else { max },
            sample,
        }
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram").field("count", &self.count()).finish_non_exhaustive()
    }
}

/// Immutable statistics derived from a histogram at one instant.
///
/// Empty snapshots report zero for every statistic.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramSnapshot {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    /// Retained sample, sorted ascending.
    sample: Vec<f64>,
}

impl HistogramSnapshot {
    /// Number of values recorded over the full stream.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Exact minimum over the full stream.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Exact maximum over the full stream.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Exact mean over the full stream (`sum / count`).
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Standard deviation of the retained sample (population variance).
    pub fn stddev(&self) -> f64 {
        let n = self.sample.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.sample.iter().sum::<f64>() / n as f64;
        let variance =
            self.sample.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
        variance.sqrt()
    }

    /// Value at a quantile in [0, 1], by linear interpolation over the
    /// sorted sample.
    pub fn value_at(&self, quantile: f64) -> f64 {
        let n = self.sample.len();
        if n == 0 {
            return 0.0;
        }
        let pos = quantile.clamp(0.0, 1.0) * (n - 1) as f64;
        let lower = pos.floor() as usize;
        let upper = pos.ceil() as usize;
        if lower == upper {
            return self.sample[lower];
        }
        self.sample[lower] + (pos - lower as f64) * (self.sample[upper] - self.sample[lower])
    }

    /// Median of the retained sample.
    pub fn median(&self) -> f64 {
        self.value_at(0.50)
    }

    /// 75th percentile of the retained sample.
    pub fn p75(&self) -> f64 {
        self.value_at(0.75)
    }

    /// 95th percentile of the retained sample.
    pub fn p95(&self) -> f64 {
        self.value_at(0.95)
    }

    /// 98th percentile of the retained sample.
    pub fn p98(&self) -> f64 {
        self.value_at(0.98)
    }

    /// 99th percentile of the retained sample.
    pub fn p99(&self) -> f64 {
        self.value_at(0.99)
    }

    /// 99.9th percentile of the retained sample.
    pub fn p999(&self) -> f64 {
        self.value_at(0.999)
    }

    /// Size of the retained sample.
    pub fn sample_len(&self) -> usize {
        self.sample.len()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for instruments::histogram.
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::instruments::reservoir::UniformReservoir;

    fn histogram(capacity: usize) -> Histogram {
        Histogram::new(Box::new(
            UniformReservoir::with_seed(capacity, 11).expect("capacity is positive"),
        ))
    }

    /// Validates the reference distribution: [1..5] yields mean 3, min 1,
    /// max 5, median 3.
    #[test]
    fn test_basic_statistics() {
        let h = histogram(16);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            h.update(v);
        }

        let snapshot = h.snapshot();
        assert_eq!(snapshot.count(), 5);
        assert_eq!(snapshot.mean(), 3.0);
        assert_eq!(snapshot.min(), 1.0);
        assert_eq!(snapshot.max(), 5.0);
        assert_eq!(snapshot.median(), 3.0);
    }

    /// Validates linear interpolation at ranks that fall between samples.
    #[test]
    fn test_percentile_interpolation() {
        let h = histogram(16);
        for v in [10.0, 20.0, 30.0, 40.0] {
            h.update(v);
        }

        let snapshot = h.snapshot();
        // pos = 0.5 * 3 = 1.5 -> halfway between 20 and 30
        assert_eq!(snapshot.median(), 25.0);
        // pos = 0.75 * 3 = 2.25 -> 30 + 0.25 * 10
        assert_eq!(snapshot.p75(), 32.5);
    }

    /// Validates that an empty snapshot reports all-zero statistics rather
    /// than an error.
    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let snapshot = histogram(4).snapshot();
        assert_eq!(snapshot.count(), 0);
        assert_eq!(snapshot.min(), 0.0);
        assert_eq!(snapshot.max(), 0.0);
        assert_eq!(snapshot.mean(), 0.0);
        assert_eq!(snapshot.stddev(), 0.0);
        assert_eq!(snapshot.median(), 0.0);
        assert_eq!(snapshot.p999(), 0.0);
    }

    /// Validates that extrema and mean stay exact once the stream exceeds
    /// the reservoir capacity.
    #[test]
    fn test_extrema_exact_beyond_capacity() {
        let h = histogram(4);
        for i in 1..=1000 {
            h.update(f64::from(i));
        }

        let snapshot = h.snapshot();
        assert_eq!(snapshot.count(), 1000);
        assert_eq!(snapshot.min(), 1.0);
        assert_eq!(snapshot.max(), 1000.0);
        assert_eq!(snapshot.mean(), 500.5);
        assert_eq!(snapshot.sample_len(), 4);
    }

    #[test]
    fn test_stddev_of_sample() {
        let h = histogram(16);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            h.update(v);
        }
        // Known population stddev of this set is exactly 2.
        assert!((h.snapshot().stddev() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_updates_keep_count_and_sum_consistent() {
        let h = Arc::new(histogram(64));
        let mut handles = vec![];
        for _ in 0..4 {
            let h = Arc::clone(&h);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    h.update(2.0);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        let snapshot = h.snapshot();
        assert_eq!(snapshot.count(), 2000);
        assert_eq!(snapshot.mean(), 2.0);
    }
}
