//! Snapshot sinks and the scheduling loop that drives them.
//!
//! A [`Reporter`] turns one registry snapshot into output (a file, a wire
//! format). [`start_reporting`] runs a reporter on a fixed interval from a
//! background thread; sink failures are logged and never take the loop
//! down.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::MetricResult;

mod csv;
mod line_protocol;

pub use csv::CsvReporter;
pub use line_protocol::{LineProtocolReporter, ReportingPrecision};

/// A sink that consumes one registry snapshot per call.
pub trait Reporter: Send + Sync {
    /// Snapshot the registry and write the result to the sink.
    ///
    /// # Errors
    ///
    /// Sink-specific; file reporters surface
    /// [`MetricError::Io`](crate::MetricError::Io).
    fn report_now(&self) -> MetricResult<()>;
}

/// Run `reporter` every `interval` on a background thread.
///
/// Errors from [`Reporter::report_now`] are logged at `warn` and the loop
/// keeps going; an instrumentation sink must never crash its host. The
/// thread exits when the returned handle is stopped or dropped.
pub fn start_reporting(reporter: Arc<dyn Reporter>, interval: Duration) -> ReporterHandle {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name("vitals-reporter".into())
        .spawn(move || {
            tracing::debug!(interval_ms = interval.as_millis() as u64, "reporter loop started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(err) = reporter.report_now() {
                            tracing::warn!(error = %err, "scheduled report failed");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("reporter loop stopped");
        });

    match thread {
        Ok(thread) => ReporterHandle { stop_tx: Some(stop_tx), thread: Some(thread) },
        Err(err) => {
            // Spawn failure leaves a handle that is already stopped.
            tracing::warn!(error = %err, "failed to spawn reporter thread");
            ReporterHandle { stop_tx: None, thread: None }
        }
    }
}

/// Owner of a running reporter loop.
///
/// Dropping the handle stops the loop as well; `stop` exists to make the
/// join explicit.
#[derive(Debug)]
pub struct ReporterHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Signal the loop to exit and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the
        // loop out of its interval wait immediately.
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("reporter thread panicked");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the reporting scheduler.
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;
    use crate::error::MetricError;

    struct CountingReporter {
        reports: AtomicUsize,
        fail: bool,
    }

    impl Reporter for CountingReporter {
        fn report_now(&self) -> MetricResult<()> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MetricError::Io(std::io::Error::other("sink unavailable")));
            }
            Ok(())
        }
    }

    /// Validates the scheduling loop fires repeatedly and stops promptly.
    #[test]
    fn test_loop_reports_on_interval_and_stops() {
        let reporter = Arc::new(CountingReporter { reports: AtomicUsize::new(0), fail: false });
        let handle = start_reporting(Arc::clone(&reporter) as Arc<dyn Reporter>,
            Duration::from_millis(10));

        thread::sleep(Duration::from_millis(100));
        let stop_started = Instant::now();
        handle.stop();
        assert!(stop_started.elapsed() < Duration::from_secs(1));

        let reports = reporter.reports.load(Ordering::SeqCst);
        assert!(reports >= 2, "expected repeated reports, got {reports}");

        // No further reports after stop.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(reporter.reports.load(Ordering::SeqCst), reports);
    }

    /// Validates sink failures are swallowed: the loop keeps reporting.
    #[test]
    fn test_loop_survives_sink_failures() {
        let reporter = Arc::new(CountingReporter { reports: AtomicUsize::new(0), fail: true });
        let handle = start_reporting(Arc::clone(&reporter) as Arc<dyn Reporter>,
            Duration::from_millis(10));

        thread::sleep(Duration::from_millis(100));
        handle.stop();

        assert!(reporter.reports.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_dropping_handle_stops_the_loop() {
        let reporter = Arc::new(CountingReporter { reports: AtomicUsize::new(0), fail: false });
        {
            let _handle = start_reporting(Arc::clone(&reporter) as Arc<dyn Reporter>,
                Duration::from_millis(10));
            thread::sleep(Duration::from_millis(40));
        }
        let reports = reporter.reports.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(reporter.reports.load(Ordering::SeqCst), reports);
    }
}
