//! The statistical instruments: counters, meters, histograms, timers,
//! gauges and event logs, plus the EWMA and reservoir primitives that back
//! them.
//!
//! Instruments are normally obtained through
//! [`MetricsRegistry`](crate::MetricsRegistry) factories, which own their
//! identity and lifecycle; the types here can also be constructed directly
//! for embedding in other structures.

pub mod counter;
pub mod ewma;
pub mod event;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod reservoir;
pub mod timer;

// Re-export commonly used types
pub use counter::Counter;
pub use event::{Event, DEFAULT_EVENT_CAPACITY};
pub use ewma::Ewma;
pub use gauge::{CallbackGauge, Gauge, SimpleGauge};
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot};
pub use reservoir::{
    ExponentiallyDecayingReservoir, Reservoir, UniformReservoir, DEFAULT_ALPHA, DEFAULT_CAPACITY,
};
pub use timer::{Timer, TimerGuard, TimerSnapshot};
