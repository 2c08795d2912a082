//! In-process metrics instrumentation: counters, meters, histograms,
//! timers, gauges and event logs behind a concurrent registry.
//!
//! Instruments accumulate while the application runs; a snapshot of the
//! whole registry can be taken at any moment and handed to a reporter
//! (CSV or InfluxDB line-protocol files, optionally on a schedule).
//!
//! # Quick start
//!
//! ```
//! use vitals::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new();
//!
//! registry.counter("cache.hits")?.inc();
//! registry.meter("requests")?.mark();
//! let timer = registry.timer("db.query")?;
//! let rows = timer.time(|| 42);
//! assert_eq!(rows, 42);
//!
//! let snapshot = registry.snapshot_by_name();
//! assert_eq!(snapshot.len(), 3);
//! # Ok::<(), vitals::MetricError>(())
//! ```
//!
//! # Cargo features
//!
//! - `serde`: derive `Serialize`/`Deserialize` on snapshot-boundary types
//!   (`FieldValue`, `EventPoint`, the snapshot structs).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod clock;
pub mod error;
pub mod global;
pub mod instruments;
pub mod registry;
pub mod reporters;
pub mod snapshot;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MetricError, MetricResult};
pub use global::{
    count_calls, dump_metrics, global_registry, hist_calls, meter_calls, set_global_registry,
    time_calls,
};
pub use registry::{InstrumentKind, MetricKey, MetricsRegistry};
pub use snapshot::{EventPoint, FieldValue, InstrumentFields};
