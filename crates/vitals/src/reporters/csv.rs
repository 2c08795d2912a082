//! CSV file reporter: one file per metric, one row per report.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::MetricResult;
use crate::registry::MetricsRegistry;
use crate::reporters::Reporter;
use crate::snapshot::FieldValue;

/// Appends each metric's fields to `<directory>/<key>.csv`.
///
/// A file gets a header row when first created; subsequent reports append
/// one data row each. Event instruments are skipped, their variable field
/// sets do not fit a fixed CSV header.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use vitals::reporters::{start_reporting, CsvReporter};
/// use vitals::MetricsRegistry;
///
/// let registry = Arc::new(MetricsRegistry::new());
/// let reporter = Arc::new(CsvReporter::new(Arc::clone(&registry), "/var/log/metrics"));
/// let handle = start_reporting(reporter, Duration::from_secs(30));
/// // ... application runs ...
/// handle.stop();
/// ```
pub struct CsvReporter {
    registry: Arc<MetricsRegistry>,
    directory: PathBuf,
    separator: String,
}

impl CsvReporter {
    /// Report into `directory`, created on first report if missing.
    pub fn new(registry: Arc<MetricsRegistry>, directory: impl Into<PathBuf>) -> Self {
        Self { registry, directory: directory.into(), separator: "\t".to_string() }
    }

    /// Override the column separator (tab by default).
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn render(value: &FieldValue) -> String {
        match value {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Text(v) => v.clone(),
        }
    }
}

impl Reporter for CsvReporter {
    fn report_now(&self) -> MetricResult<()> {
        fs::create_dir_all(&self.directory)?;
        let stamp = DateTime::<Utc>::from(self.registry.clock().system_time())
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        for (key, fields) in self.registry.snapshot_by_name() {
            if fields.fields.is_empty() {
                continue;
            }

            let path = self.directory.join(format!("{key}.csv"));
            let fresh = !path.exists();
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

            if fresh {
                let mut header = vec!["timestamp".to_string()];
                header.extend(fields.fields.keys().cloned());
                writeln!(file, "{}", header.join(&self.separator))?;
            }

            let mut row = vec![stamp.clone()];
            row.extend(fields.fields.values().map(Self::render));
            writeln!(file, "{}", row.join(&self.separator))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CsvReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvReporter").field("directory", &self.directory).finish_non_exhaustive()
    }
}
