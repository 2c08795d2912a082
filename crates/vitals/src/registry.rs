//! Instrument identity and lifecycle.
//!
//! A [`MetricsRegistry`] maps each [`MetricKey`] (name plus tag set) to
//! exactly one instrument. Factories are get-or-create: concurrent callers
//! requesting the same new identity race under the map's entry lock and all
//! receive the single winning instance. Requesting an existing identity
//! under a different instrument kind is a conflict error and alters
//! nothing.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::error::{MetricError, MetricResult};
use crate::instruments::histogram::Histogram;
use crate::instruments::reservoir::Reservoir;
use crate::instruments::{Counter, Event, Gauge, Meter, SimpleGauge, Timer};
use crate::snapshot::InstrumentFields;

/// Identity of one metric: a name plus an order-independent tag mapping.
///
/// Equality and hashing cover the name and the tag contents, so the same
/// tags supplied in any order address the same instrument.
///
/// # Examples
///
/// ```
/// use vitals::MetricKey;
///
/// let plain = MetricKey::from("requests");
/// let tagged = MetricKey::new("requests").tag("region", "eu").tag("host", "a1");
/// assert_eq!(tagged.qualified_name(), "requests{host=a1,region=eu}");
/// assert_ne!(plain, tagged);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    name: String,
    tags: BTreeMap<String, String>,
}

impl MetricKey {
    /// Create a tag-less key.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), tags: BTreeMap::new() }
    }

    /// Add one tag, builder style.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag mapping, sorted by tag name.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Stable string key: the name alone when tag-less, otherwise
    /// `name{k=v,...}` with tags in sorted order.
    pub fn qualified_name(&self) -> String {
        if self.tags.is_empty() {
            return self.name.clone();
        }
        let tags: Vec<String> =
            self.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}{{{}}}", self.name, tags.join(","))
    }
}

impl From<&str> for MetricKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MetricKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Kind discriminant used in conflict errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Signed counter.
    Counter,
    /// Rate meter.
    Meter,
    /// Distribution histogram.
    Histogram,
    /// Rate + duration timer.
    Timer,
    /// Instantaneous value source.
    Gauge,
    /// Event log.
    Event,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Counter => "counter",
            Self::Meter => "meter",
            Self::Histogram => "histogram",
            Self::Timer => "timer",
            Self::Gauge => "gauge",
            Self::Event => "event",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
enum GaugeEntry {
    Simple(Arc<SimpleGauge>),
    Custom(Arc<dyn Gauge>),
}

impl GaugeEntry {
    fn as_gauge(&self) -> Arc<dyn Gauge> {
        match self {
            Self::Simple(gauge) => Arc::clone(gauge) as Arc<dyn Gauge>,
            Self::Custom(gauge) => Arc::clone(gauge),
        }
    }
}

#[derive(Clone)]
enum Instrument {
    Counter(Arc<Counter>),
    Meter(Arc<Meter>),
    Histogram(Arc<Histogram>),
    Timer(Arc<Timer>),
    Gauge(GaugeEntry),
    Event(Arc<Event>),
}

impl Instrument {
    fn kind(&self) -> InstrumentKind {
        match self {
            Self::Counter(_) => InstrumentKind::Counter,
            Self::Meter(_) => InstrumentKind::Meter,
            Self::Histogram(_) => InstrumentKind::Histogram,
            Self::Timer(_) => InstrumentKind::Timer,
            Self::Gauge(_) => InstrumentKind::Gauge,
            Self::Event(_) => InstrumentKind::Event,
        }
    }
}

/// Owner of all instruments addressed by identity.
///
/// Instruments are exclusively owned by the registry that created them;
/// callers hold shared references, never take ownership.
///
/// # Examples
///
/// ```
/// use vitals::MetricsRegistry;
///
/// let registry = MetricsRegistry::new();
/// let requests = registry.counter("requests")?;
/// requests.inc();
///
/// // Same identity, same instance.
/// assert_eq!(registry.counter("requests")?.count(), 1);
/// # Ok::<(), vitals::MetricError>(())
/// ```
pub struct MetricsRegistry {
    clock: Arc<dyn Clock>,
    metrics: DashMap<MetricKey, Instrument>,
}

impl MetricsRegistry {
    /// Create a registry reading time from the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry with an injected clock (deterministic tests).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, metrics: DashMap::new() }
    }

    /// The clock this registry hands to its instruments.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Get or create the counter registered under `key`.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn counter(&self, key: impl Into<MetricKey>) -> MetricResult<Arc<Counter>> {
        self.get_or_create(
            key.into(),
            InstrumentKind::Counter,
            |instrument| match instrument {
                Instrument::Counter(counter) => Some(Arc::clone(counter)),
                _ => None,
            },
            || {
                let counter = Arc::new(Counter::new());
                (Arc::clone(&counter), Instrument::Counter(counter))
            },
        )
    }

    /// Get or create the meter registered under `key`.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn meter(&self, key: impl Into<MetricKey>) -> MetricResult<Arc<Meter>> {
        let clock = Arc::clone(&self.clock);
        self.get_or_create(
            key.into(),
            InstrumentKind::Meter,
            |instrument| match instrument {
                Instrument::Meter(meter) => Some(Arc::clone(meter)),
                _ => None,
            },
            move || {
                let meter = Arc::new(Meter::new(clock));
                (Arc::clone(&meter), Instrument::Meter(meter))
            },
        )
    }

    /// Get or create the histogram registered under `key`, backed by a
    /// default forward-decaying reservoir.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn histogram(&self, key: impl Into<MetricKey>) -> MetricResult<Arc<Histogram>> {
        let clock = Arc::clone(&self.clock);
        self.histogram_with(key, move || {
            Box::new(crate::instruments::ExponentiallyDecayingReservoir::with_defaults(clock))
        })
    }

    /// Get or create the histogram registered under `key`, building its
    /// reservoir from `reservoir` only when the histogram does not yet
    /// exist.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn histogram_with<F>(
        &self,
        key: impl Into<MetricKey>,
        reservoir: F,
    ) -> MetricResult<Arc<Histogram>>
    where
        F: FnOnce() -> Box<dyn Reservoir>,
    {
        self.get_or_create(
            key.into(),
            InstrumentKind::Histogram,
            |instrument| match instrument {
                Instrument::Histogram(histogram) => Some(Arc::clone(histogram)),
                _ => None,
            },
            move || {
                let histogram = Arc::new(Histogram::new(reservoir()));
                (Arc::clone(&histogram), Instrument::Histogram(histogram))
            },
        )
    }

    /// Get or create the timer registered under `key`.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn timer(&self, key: impl Into<MetricKey>) -> MetricResult<Arc<Timer>> {
        let clock = Arc::clone(&self.clock);
        self.get_or_create(
            key.into(),
            InstrumentKind::Timer,
            |instrument| match instrument {
                Instrument::Timer(timer) => Some(Arc::clone(timer)),
                _ => None,
            },
            move || {
                let timer = Arc::new(Timer::new(clock));
                (Arc::clone(&timer), Instrument::Timer(timer))
            },
        )
    }

    /// Get or create a settable gauge registered under `key`.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind, or a
    /// gauge whose source the registry cannot hand back as settable.
    pub fn gauge(&self, key: impl Into<MetricKey>) -> MetricResult<Arc<SimpleGauge>> {
        self.get_or_create(
            key.into(),
            InstrumentKind::Gauge,
            |instrument| match instrument {
                Instrument::Gauge(GaugeEntry::Simple(gauge)) => Some(Arc::clone(gauge)),
                _ => None,
            },
            || {
                let gauge = Arc::new(SimpleGauge::default());
                (Arc::clone(&gauge), Instrument::Gauge(GaugeEntry::Simple(gauge)))
            },
        )
    }

    /// Get or create a gauge backed by a caller-supplied source.
    ///
    /// When `key` already holds a gauge the existing source wins and
    /// `source` is dropped.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn register_gauge(
        &self,
        key: impl Into<MetricKey>,
        source: Arc<dyn Gauge>,
    ) -> MetricResult<Arc<dyn Gauge>> {
        self.get_or_create(
            key.into(),
            InstrumentKind::Gauge,
            |instrument| match instrument {
                Instrument::Gauge(entry) => Some(entry.as_gauge()),
                _ => None,
            },
            move || (Arc::clone(&source), Instrument::Gauge(GaugeEntry::Custom(source))),
        )
    }

    /// Get or create the event log registered under `key`.
    ///
    /// # Errors
    ///
    /// [`MetricError::KindConflict`] if `key` holds another kind.
    pub fn event(&self, key: impl Into<MetricKey>) -> MetricResult<Arc<Event>> {
        let clock = Arc::clone(&self.clock);
        self.get_or_create(
            key.into(),
            InstrumentKind::Event,
            |instrument| match instrument {
                Instrument::Event(event) => Some(Arc::clone(event)),
                _ => None,
            },
            move || {
                let event = Arc::new(Event::new(clock));
                (Arc::clone(&event), Instrument::Event(event))
            },
        )
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&self, key: &MetricKey) -> bool {
        self.metrics.remove(key).is_some()
    }

    /// Drop all instruments.
    pub fn clear(&self) {
        self.metrics.clear();
    }

    /// Number of registered instruments.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the registry holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Snapshot every instrument, keyed by identity.
    ///
    /// Each instrument is read with per-instrument consistency; event logs
    /// are drained so their points are reported exactly once.
    pub fn snapshot(&self) -> HashMap<MetricKey, InstrumentFields> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), Self::fields_of(entry.key(), entry.value())))
            .collect()
    }

    /// Snapshot every instrument, keyed by the stable string key.
    pub fn snapshot_by_name(&self) -> BTreeMap<String, InstrumentFields> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().qualified_name(), Self::fields_of(entry.key(), entry.value())))
            .collect()
    }

    fn fields_of(key: &MetricKey, instrument: &Instrument) -> InstrumentFields {
        let base = InstrumentFields::with_tags(key.tags().clone());
        match instrument {
            Instrument::Counter(counter) => base.field("count", counter.count()),
            Instrument::Gauge(entry) => base.field("value", entry.as_gauge().value()),
            Instrument::Meter(meter) => {
                let snapshot = meter.snapshot();
                base.field("count", snapshot.count as i64)
                    .field("mean_rate", snapshot.mean_rate)
                    .field("m1_rate", snapshot.m1_rate)
                    .field("m5_rate", snapshot.m5_rate)
                    .field("m15_rate", snapshot.m15_rate)
            }
            Instrument::Histogram(histogram) => {
                Self::distribution_fields(base, &histogram.snapshot())
            }
            Instrument::Timer(timer) => {
                let snapshot = timer.snapshot();
                let base = base
                    .field("count", snapshot.rate.count as i64)
                    .field("mean_rate", snapshot.rate.mean_rate)
                    .field("m1_rate", snapshot.rate.m1_rate)
                    .field("m5_rate", snapshot.rate.m5_rate)
                    .field("m15_rate", snapshot.rate.m15_rate);
                Self::distribution_fields(base, &snapshot.duration)
            }
            Instrument::Event(event) => {
                let mut fields = base;
                fields.events = event.drain();
                fields
            }
        }
    }

    fn distribution_fields(
        base: InstrumentFields,
        snapshot: &crate::instruments::HistogramSnapshot,
    ) -> InstrumentFields {
        base.field("min", snapshot.min())
            .field("max", snapshot.max())
            .field("mean", snapshot.mean())
            .field("stddev", snapshot.stddev())
            .field("median", snapshot.median())
            .field("p75", snapshot.p75())
            .field("p95", snapshot.p95())
            .field("p98", snapshot.p98())
            .field("p99", snapshot.p99())
            .field("p999", snapshot.p999())
    }

    /// Get-or-create under the map's entry lock: exactly one instance is
    /// created per identity regardless of how many callers race.
    fn get_or_create<T>(
        &self,
        key: MetricKey,
        requested: InstrumentKind,
        extract: impl Fn(&Instrument) -> Option<T>,
        create: impl FnOnce() -> (T, Instrument),
    ) -> MetricResult<T> {
        match self.metrics.entry(key) {
            Entry::Occupied(entry) => {
                extract(entry.get()).ok_or_else(|| MetricError::KindConflict {
                    key: entry.key().qualified_name(),
                    existing: entry.get().kind(),
                    requested,
                })
            }
            Entry::Vacant(entry) => {
                let (handle, instrument) = create();
                entry.insert(instrument);
                Ok(handle)
            }
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry").field("len", &self.len()).finish_non_exhaustive()
    }
}
