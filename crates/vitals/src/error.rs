//! Error types for instrument construction and registry lookups.
//!
//! Hot-path mutation operations (`inc`, `mark`, `update`) are infallible by
//! design; errors only arise at construction time or when a registry factory
//! is asked for an identity that already exists under a different kind.

use thiserror::Error;

use crate::registry::InstrumentKind;

/// Standard result type for fallible `vitals` operations.
pub type MetricResult<T> = Result<T, MetricError>;

/// Errors surfaced by the registry and instrument constructors.
#[derive(Debug, Error)]
pub enum MetricError {
    /// A registry factory was called for an identity that already holds an
    /// instrument of a different kind. Nothing is created or altered.
    #[error("metric '{key}' is already registered as a {existing}, requested {requested}")]
    KindConflict {
        /// Stable string form of the conflicting identity.
        key: String,
        /// Kind of the instrument already registered.
        existing: InstrumentKind,
        /// Kind the caller asked for.
        requested: InstrumentKind,
    },

    /// A bounded structure was configured with a capacity of zero.
    #[error("{what} capacity must be positive")]
    InvalidCapacity {
        /// Which structure rejected the configuration.
        what: &'static str,
    },

    /// A reporter sink failed to write. Scheduled reporting logs and skips
    /// these; they never reach metric producers.
    #[error("reporter sink I/O failure: {0}")]
    Io(#[from] std::io::Error),
}
