/// Progress reporting: the sink abstraction every long-running operation
/// reports through, and the messages a background scan sends to the
/// foreground over a crossbeam channel.
use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives `(fraction, status)` updates from long-running work.
///
/// Implementations must be cheap: they are called from worker threads,
/// possibly from several rayon workers at once.
pub trait ProgressSink: Send + Sync {
    /// `fraction` is in `[0, 1]` and never decreases within one operation.
    fn report(&self, fraction: f64, status: &str);

    /// A scan root could not be enumerated. Sibling roots keep going.
    fn root_error(&self, _error: &RootError) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, fraction: f64, status: &str) {
        self(fraction, status)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64, _status: &str) {}
}

/// A scan root that could not be scanned (missing, not a directory,
/// unreadable). Reported once per root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootError {
    pub root: PathBuf,
    pub message: String,
}

impl std::fmt::Display for RootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.root.display(), self.message)
    }
}

/// Messages sent from a background scan thread to the foreground.
///
/// `T` is the scan's final snapshot type. Terminal messages carry the
/// snapshot by value, so the receiver owns it outright.
#[derive(Debug)]
pub enum ScanProgress<T> {
    /// Periodic update.
    Update { fraction: f64, status: String },
    /// A root was skipped.
    RootError(RootError),
    /// The scan ran to completion.
    Complete(T),
    /// The scan was cancelled; the snapshot holds everything accumulated
    /// before the cancellation point.
    Cancelled(T),
}

/// Forwards sink calls into a scan progress channel.
pub struct ChannelSink<T> {
    tx: Sender<ScanProgress<T>>,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: Sender<ScanProgress<T>>) -> Self {
        Self { tx }
    }
}

impl<T: Send> ProgressSink for ChannelSink<T> {
    fn report(&self, fraction: f64, status: &str) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.tx.send(ScanProgress::Update {
            fraction,
            status: status.to_string(),
        });
    }

    fn root_error(&self, error: &RootError) {
        let _ = self.tx.send(ScanProgress::RootError(error.clone()));
    }
}

/// Wraps a sink so that reported fractions are clamped to `[0, 1]` and
/// never go backwards, even when updates come from several threads.
pub(crate) struct MonotonicProgress<'a> {
    sink: &'a dyn ProgressSink,
    last_bits: AtomicU64,
}

impl<'a> MonotonicProgress<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub(crate) fn report(&self, fraction: f64, status: &str) {
        let wanted = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Non-negative f64 bit patterns order the same way as the values.
        let previous = self.last_bits.fetch_max(wanted.to_bits(), Ordering::AcqRel);
        let effective = f64::from_bits(previous.max(wanted.to_bits()));
        self.sink.report(effective, status);
    }

    pub(crate) fn root_error(&self, error: &RootError) {
        self.sink.root_error(error);
    }

    /// Map a local `[0, 1]` fraction into the sub-range `[start, end]`.
    pub(crate) fn report_in(&self, start: f64, end: f64, local: f64, status: &str) {
        self.report(start + (end - start) * local.clamp(0.0, 1.0), status);
    }
}
