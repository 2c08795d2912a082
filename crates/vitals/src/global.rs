//! Process-wide default registry and convenience instrumentation.
//!
//! Libraries that do not want to thread a [`MetricsRegistry`] handle through
//! their call graph can use the free functions here; they all resolve
//! against a lazily initialized global registry that can be swapped out
//! (typically once at startup, to install a registry with an injected
//! clock).

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::MetricResult;
use crate::instruments::{Counter, Event, Histogram, Meter, SimpleGauge, Timer};
use crate::registry::{MetricKey, MetricsRegistry};
use crate::snapshot::InstrumentFields;

static GLOBAL: Lazy<RwLock<Arc<MetricsRegistry>>> =
    Lazy::new(|| RwLock::new(Arc::new(MetricsRegistry::new())));

/// The current process-wide registry.
pub fn global_registry() -> Arc<MetricsRegistry> {
    Arc::clone(&GLOBAL.read())
}

/// Replace the process-wide registry, returning the previous one.
///
/// Instruments already resolved from the previous registry keep working;
/// they simply stop appearing in global snapshots.
pub fn set_global_registry(registry: Arc<MetricsRegistry>) -> Arc<MetricsRegistry> {
    std::mem::replace(&mut *GLOBAL.write(), registry)
}

/// Get or create a counter in the global registry.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// key holds another kind.
pub fn counter(key: impl Into<MetricKey>) -> MetricResult<Arc<Counter>> {
    global_registry().counter(key)
}

/// Get or create a meter in the global registry.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// key holds another kind.
pub fn meter(key: impl Into<MetricKey>) -> MetricResult<Arc<Meter>> {
    global_registry().meter(key)
}

/// Get or create a histogram in the global registry.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// key holds another kind.
pub fn histogram(key: impl Into<MetricKey>) -> MetricResult<Arc<Histogram>> {
    global_registry().histogram(key)
}

/// Get or create a timer in the global registry.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// key holds another kind.
pub fn timer(key: impl Into<MetricKey>) -> MetricResult<Arc<Timer>> {
    global_registry().timer(key)
}

/// Get or create a settable gauge in the global registry.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// key holds another kind or a callback-backed gauge.
pub fn gauge(key: impl Into<MetricKey>) -> MetricResult<Arc<SimpleGauge>> {
    global_registry().gauge(key)
}

/// Get or create an event log in the global registry.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// key holds another kind.
pub fn event(key: impl Into<MetricKey>) -> MetricResult<Arc<Event>> {
    global_registry().event(key)
}

/// Snapshot the global registry, keyed by the stable string key.
pub fn dump_metrics() -> BTreeMap<String, InstrumentFields> {
    global_registry().snapshot_by_name()
}

/// Drop every instrument in the global registry.
pub fn clear() {
    global_registry().clear();
}

/// Run `op`, counting the invocation on the counter `<name>_calls`.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// derived key holds another kind; `op` does not run in that case.
pub fn count_calls<F, R>(name: &str, op: F) -> MetricResult<R>
where
    F: FnOnce() -> R,
{
    let counter = counter(format!("{name}_calls"))?;
    counter.inc();
    Ok(op())
}

/// Run `op`, marking the invocation on the meter `<name>_calls`.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// derived key holds another kind; `op` does not run in that case.
pub fn meter_calls<F, R>(name: &str, op: F) -> MetricResult<R>
where
    F: FnOnce() -> R,
{
    let meter = meter(format!("{name}_calls"))?;
    meter.mark();
    Ok(op())
}

/// Run `op` and record its return value on the histogram `<name>_calls`.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// derived key holds another kind; `op` does not run in that case.
pub fn hist_calls<F>(name: &str, op: F) -> MetricResult<f64>
where
    F: FnOnce() -> f64,
{
    let histogram = histogram(format!("{name}_calls"))?;
    let value = op();
    histogram.update(value);
    Ok(value)
}

/// Run `op` under the timer `<name>_calls`.
///
/// The measurement is guard-scoped, so a panicking `op` is still recorded
/// before the panic propagates.
///
/// # Errors
///
/// [`MetricError::KindConflict`](crate::MetricError::KindConflict) if the
/// derived key holds another kind; `op` does not run in that case.
pub fn time_calls<F, R>(name: &str, op: F) -> MetricResult<R>
where
    F: FnOnce() -> R,
{
    let timer = timer(format!("{name}_calls"))?;
    let _guard = timer.start();
    Ok(op())
}
