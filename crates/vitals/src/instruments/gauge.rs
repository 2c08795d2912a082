//! Gauges: instantaneous values read from a caller-supplied source.

use parking_lot::RwLock;

use crate::snapshot::FieldValue;

/// A value source read at snapshot time.
///
/// Gauges hold no statistical state of their own; every read delegates to
/// the underlying source.
pub trait Gauge: Send + Sync {
    /// Current value.
    fn value(&self) -> FieldValue;
}

/// Gauge that invokes a zero-argument callback on every read.
///
/// # Examples
///
/// ```
/// use vitals::instruments::{CallbackGauge, Gauge};
/// use vitals::FieldValue;
///
/// let gauge = CallbackGauge::new(|| FieldValue::Int(42));
/// assert_eq!(gauge.value(), FieldValue::Int(42));
/// ```
pub struct CallbackGauge {
    callback: Box<dyn Fn() -> FieldValue + Send + Sync>,
}

impl CallbackGauge {
    /// Wrap a callback as a gauge.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        Self { callback: Box::new(callback) }
    }
}

impl Gauge for CallbackGauge {
    fn value(&self) -> FieldValue {
        (self.callback)()
    }
}

impl std::fmt::Debug for CallbackGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackGauge").finish_non_exhaustive()
    }
}

/// Gauge holding a value written by the caller.
#[derive(Debug)]
pub struct SimpleGauge {
    value: RwLock<FieldValue>,
}

impl SimpleGauge {
    /// Create a gauge with an initial value.
    pub fn new(initial: impl Into<FieldValue>) -> Self {
        Self { value: RwLock::new(initial.into()) }
    }

    /// Replace the stored value.
    pub fn set_value(&self, value: impl Into<FieldValue>) {
        *self.value.write() = value.into();
    }
}

impl Default for SimpleGauge {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Gauge for SimpleGauge {
    fn value(&self) -> FieldValue {
        self.value.read().clone()
    }
}
