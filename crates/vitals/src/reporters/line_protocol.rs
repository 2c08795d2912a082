//! InfluxDB line-protocol file reporter.
//!
//! Each report writes one batch file of `measurement,tags fields timestamp`
//! lines. Integer-marked fields carry the `i` suffix, text fields are
//! quoted, and tag keys/values escape the delimiter characters.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::MetricResult;
use crate::registry::MetricsRegistry;
use crate::reporters::Reporter;
use crate::snapshot::{EventPoint, FieldValue};

/// Timestamp resolution of emitted lines.
///
/// Epoch seconds are rescaled to the chosen unit and truncated, so every
/// line carries an integer timestamp in that unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingPrecision {
    /// Whole hours since the epoch.
    Hours,
    /// Whole minutes since the epoch.
    Minutes,
    /// Whole seconds since the epoch.
    Seconds,
    /// Milliseconds since the epoch.
    Milliseconds,
    /// Microseconds since the epoch.
    Microseconds,
    /// Nanoseconds since the epoch.
    Nanoseconds,
}

impl ReportingPrecision {
    fn rescale(self, epoch_secs: f64) -> i64 {
        let scaled = match self {
            Self::Hours => epoch_secs / 3600.0,
            Self::Minutes => epoch_secs / 60.0,
            Self::Seconds => epoch_secs,
            Self::Milliseconds => epoch_secs * 1e3,
            Self::Microseconds => epoch_secs * 1e6,
            Self::Nanoseconds => epoch_secs * 1e9,
        };
        scaled as i64
    }
}

/// Writes each snapshot as a line-protocol batch file
/// `<directory>/<uuid>.txt`.
///
/// Regular instruments produce one line per metric stamped at report time;
/// event instruments produce one line per drained point stamped at the
/// point's own record time.
pub struct LineProtocolReporter {
    registry: Arc<MetricsRegistry>,
    directory: PathBuf,
    prefix: Option<String>,
    global_tags: BTreeMap<String, String>,
    precision: ReportingPrecision,
}

impl LineProtocolReporter {
    /// Report into `directory`, created on first report if missing.
    pub fn new(registry: Arc<MetricsRegistry>, directory: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            directory: directory.into(),
            prefix: None,
            global_tags: BTreeMap::new(),
            precision: ReportingPrecision::Seconds,
        }
    }

    /// Prepend `prefix.` to every measurement name.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Attach a tag to every line. Metric tags win on key collision.
    #[must_use]
    pub fn with_global_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_tags.insert(key.into(), value.into());
        self
    }

    /// Set the timestamp resolution (seconds by default).
    #[must_use]
    pub fn with_precision(mut self, precision: ReportingPrecision) -> Self {
        self.precision = precision;
        self
    }

    fn measurement(&self, name: &str) -> String {
        let full = match &self.prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        };
        escape_tag(&full)
    }

    fn tag_set(&self, metric_tags: &BTreeMap<String, String>) -> String {
        let mut merged = self.global_tags.clone();
        merged.extend(metric_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
            .iter()
            .map(|(k, v)| format!("{}={}", escape_tag(k), escape_tag(v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn line(measurement: &str, tags: &str, fields: &str, timestamp: i64) -> String {
        if tags.is_empty() {
            format!("{measurement} {fields} {timestamp}")
        } else {
            format!("{measurement},{tags} {fields} {timestamp}")
        }
    }

    fn event_lines(
        &self,
        measurement: &str,
        tags: &str,
        points: &[EventPoint],
        out: &mut Vec<String>,
    ) {
        for point in points {
            if point.fields.is_empty() {
                continue;
            }
            let fields = render_fields(&point.fields);
            out.push(Self::line(measurement, tags, &fields, self.precision.rescale(point.time_secs)));
        }
    }
}

impl Reporter for LineProtocolReporter {
    fn report_now(&self) -> MetricResult<()> {
        let timestamp = self.precision.rescale(self.registry.clock().epoch_secs());

        let mut lines = Vec::new();
        for (key, instrument) in self.registry.snapshot() {
            let measurement = self.measurement(key.name());
            let tags = self.tag_set(&instrument.tags);

            if !instrument.fields.is_empty() {
                let fields = render_fields(&instrument.fields);
                lines.push(Self::line(&measurement, &tags, &fields, timestamp));
            }
            self.event_lines(&measurement, &tags, &instrument.events, &mut lines);
        }

        if lines.is_empty() {
            return Ok(());
        }
        lines.sort();

        fs::create_dir_all(&self.directory)?;
        let path = self.directory.join(format!("{}.txt", Uuid::new_v4().simple()));
        fs::write(path, lines.join("\n") + "\n")?;
        Ok(())
    }
}

impl std::fmt::Debug for LineProtocolReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineProtocolReporter")
            .field("directory", &self.directory)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

fn escape_tag(raw: &str) -> String {
    raw.replace(' ', "\\ ").replace(',', "\\,").replace('=', "\\=")
}

fn render_fields(fields: &BTreeMap<String, FieldValue>) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            let rendered = match value {
                FieldValue::Int(v) => format!("{v}i"),
                FieldValue::Float(v) => v.to_string(),
                FieldValue::Text(v) => {
                    format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))
                }
            };
            format!("{name}={rendered}")
        })
        .collect::<Vec<_>>()
        .join(",")
}
