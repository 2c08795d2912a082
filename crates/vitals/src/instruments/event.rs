//! Bounded log of timestamped, field-tagged occurrences.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::{MetricError, MetricResult};
use crate::snapshot::{EventPoint, FieldValue};

/// Default maximum number of retained points.
pub const DEFAULT_EVENT_CAPACITY: usize = 8192;

#[derive(Debug)]
struct EventState {
    points: VecDeque<EventPoint>,
    dropped: u64,
}

/// An ordered log of event points.
///
/// The log is bounded: when full, the oldest point is dropped so a quiet
/// reporter cannot leak memory in a long-running process. Registry
/// snapshots drain the log, so each point is reported once.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use vitals::clock::SystemClock;
/// use vitals::instruments::Event;
///
/// let event = Event::new(Arc::new(SystemClock));
/// event.record([("status", 200i64)]);
/// assert_eq!(event.len(), 1);
/// ```
pub struct Event {
    clock: Arc<dyn Clock>,
    capacity: usize,
    state: Mutex<EventState>,
}

impl Event {
    /// Create an event log with the default capacity.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity: DEFAULT_EVENT_CAPACITY,
            state: Mutex::new(EventState { points: VecDeque::new(), dropped: 0 }),
        }
    }

    /// Create an event log with an explicit capacity.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidCapacity`] when `capacity` is zero.
    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> MetricResult<Self> {
        if capacity == 0 {
            return Err(MetricError::InvalidCapacity { what: "event log" });
        }
        Ok(Self {
            clock,
            capacity,
            state: Mutex::new(EventState { points: VecDeque::new(), dropped: 0 }),
        })
    }

    /// Append a point timestamped now from any key/value iterator.
    pub fn record<I, K, V>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let fields: BTreeMap<String, FieldValue> =
            fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let point = EventPoint { time_secs: self.clock.epoch_secs(), fields };

        let mut state = self.state.lock();
        if state.points.len() == self.capacity {
            state.points.pop_front();
            state.dropped += 1;
            if state.dropped == 1 {
                tracing::warn!(
                    capacity = self.capacity,
                    "event log full; dropping oldest points until next drain"
                );
            }
        }
        state.points.push_back(point);
    }

    /// Non-draining read of the retained points, oldest first.
    pub fn points(&self) -> Vec<EventPoint> {
        self.state.lock().points.iter().cloned().collect()
    }

    /// Take all retained points, leaving the log empty.
    pub fn drain(&self) -> Vec<EventPoint> {
        let mut state = self.state.lock();
        state.dropped = 0;
        state.points.drain(..).collect()
    }

    /// Number of retained points.
    pub fn len(&self) -> usize {
        self.state.lock().points.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
