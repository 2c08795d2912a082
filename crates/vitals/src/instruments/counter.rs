//! Lock-free signed counter.

use std::sync::atomic::{AtomicI64, Ordering};

/// An incrementing and decrementing 64-bit counter.
///
/// Mutations are atomic: concurrent callers never lose an update. The value
/// is signed and may go negative.
///
/// # Examples
///
/// ```
/// use vitals::instruments::Counter;
///
/// let counter = Counter::new();
/// counter.inc();
/// counter.inc_by(4);
/// counter.dec();
/// assert_eq!(counter.count(), 4);
/// ```
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self { count: AtomicI64::new(0) }
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment by `delta`.
    pub fn inc_by(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    /// Decrement by one.
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrement by `delta`.
    pub fn dec_by(&self, delta: i64) {
        self.count.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Reset the count to zero.
    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for instruments::counter.
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_counter_starts_at_zero() {
        let counter = Counter::new();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_inc_dec_deltas() {
        let counter = Counter::new();
        counter.inc_by(10);
        counter.dec_by(3);
        counter.inc();
        counter.dec();
        assert_eq!(counter.count(), 7);
    }

    #[test]
    fn test_counter_can_go_negative() {
        let counter = Counter::new();
        counter.dec_by(5);
        assert_eq!(counter.count(), -5);
    }

    #[test]
    fn test_clear() {
        let counter = Counter::new();
        counter.inc_by(42);
        counter.clear();
        assert_eq!(counter.count(), 0);
    }

    /// Validates linearizability: the final count equals the exact signed sum
    /// of all deltas applied across threads.
    #[test]
    fn test_concurrent_increments() {
        let counter = Arc::new(Counter::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    counter.inc_by(2);
                    counter.dec();
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        assert_eq!(counter.count(), 8 * 1000);
    }
}
