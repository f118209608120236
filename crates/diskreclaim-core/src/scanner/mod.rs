/// Scanner module: traversal, the generic scan pipeline and the background
/// worker that runs it.
///
/// Every long-running job (pipeline scan, duplicate search, treemap tree
/// scan) runs on a named background thread and reports through a bounded
/// crossbeam channel of [`ScanProgress`] messages. The final snapshot is
/// moved into the terminal message, so the foreground never shares a
/// buffer with the worker.
///
/// A [`Scanner`] allows one job in flight at a time. Starting a second one
/// while the first runs fails with [`ScanError::AlreadyRunning`]; callers
/// cancel the running job first.
pub mod accountant;
pub mod external;
pub mod pipeline;
pub mod profiles;
pub mod progress;
pub mod roots;
pub mod tree;

pub use accountant::SizeAccountant;
pub use external::{container_usage, CommandRunner, ExternalError, SystemCommandRunner, ToolReport};
pub use pipeline::{run_scan, ScanFilter, ScanOutcome, ScanRequest, SortKey};
pub use profiles::{build_request, ScanKind};
pub use progress::{ChannelSink, NoProgress, ProgressSink, RootError, ScanProgress};
pub use roots::{Enumeration, ScanRoot, TraversalLimits};
pub use tree::{scan_tree, TreeScan};

use crate::analysis::duplicates::{find_duplicates, DedupOptions, DedupOutcome};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum number of progress messages that may queue up in the channel.
///
/// The pipeline batches its updates, so a slow consumer rarely fills this.
/// When it does, the worker blocks on `send` rather than growing the heap.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Why a background job could not be started.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("no previous scan to repeat")]
    NoPreviousRequest,

    #[error("scan request has no roots")]
    EmptyRequest,

    #[error("failed to spawn scanner thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A snapshot that knows whether it was cut short.
pub trait ScanSnapshot: Send + 'static {
    fn was_cancelled(&self) -> bool;
}

impl ScanSnapshot for ScanOutcome {
    fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl ScanSnapshot for DedupOutcome {
    fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl ScanSnapshot for TreeScan {
    fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Handle to a running or completed background job. Allows cancellation
/// and receiving progress updates.
pub struct ScanHandle<T> {
    /// Receiver for progress updates from the worker thread.
    pub progress_rx: Receiver<ScanProgress<T>>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl<T> ScanHandle<T> {
    /// Request the job to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Block until the job publishes its snapshot, discarding progress
    /// updates. Returns `None` if the worker died without publishing.
    pub fn wait(mut self) -> Option<T> {
        self.wait_with(|_| {})
    }

    /// Like [`wait`](Self::wait), passing every non-terminal message to
    /// `on_update` first.
    pub fn wait_with(&mut self, mut on_update: impl FnMut(&ScanProgress<T>)) -> Option<T> {
        let mut snapshot = None;
        for message in self.progress_rx.iter() {
            match message {
                ScanProgress::Complete(s) | ScanProgress::Cancelled(s) => {
                    snapshot = Some(s);
                    break;
                }
                other => on_update(&other),
            }
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Scanner thread panicked");
            }
        }
        snapshot
    }

    /// Non-blocking poll for the terminal message, for callers that drain
    /// the channel on their own schedule. Returns `None` when nothing
    /// terminal has arrived within `timeout`.
    pub fn poll(&self, timeout: Duration) -> Option<ScanProgress<T>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.progress_rx.recv_timeout(remaining) {
                Ok(message @ (ScanProgress::Complete(_) | ScanProgress::Cancelled(_))) => {
                    return Some(message)
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Releases the in-flight flag when the worker finishes, however it exits.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Starts background jobs, one at a time.
///
/// The last pipeline request is remembered so the view can be refreshed
/// after a destructive action with [`Scanner::rescan`].
#[derive(Default)]
pub struct Scanner {
    in_flight: Arc<AtomicBool>,
    last_request: Mutex<Option<ScanRequest>>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a job is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run the scan pipeline for `request` in the background.
    pub fn start(&self, request: ScanRequest) -> Result<ScanHandle<ScanOutcome>, ScanError> {
        if request.roots.is_empty() {
            return Err(ScanError::EmptyRequest);
        }
        let remembered = request.clone();
        let handle = self.spawn(move |sink, cancel| run_scan(&request, sink, cancel))?;
        info!("Started {} scan", remembered.label);
        // Only a scan that actually started becomes the one to repeat.
        *self.last_request.lock() = Some(remembered);
        Ok(handle)
    }

    /// Repeat the most recent pipeline scan.
    pub fn rescan(&self) -> Result<ScanHandle<ScanOutcome>, ScanError> {
        let request = self
            .last_request
            .lock()
            .clone()
            .ok_or(ScanError::NoPreviousRequest)?;
        self.start(request)
    }

    /// Search `roots` for duplicate files in the background.
    pub fn start_duplicates(
        &self,
        roots: Vec<ScanRoot>,
        options: DedupOptions,
    ) -> Result<ScanHandle<DedupOutcome>, ScanError> {
        if roots.is_empty() {
            return Err(ScanError::EmptyRequest);
        }
        self.spawn(move |sink, cancel| find_duplicates(&roots, &options, sink, cancel))
    }

    /// Build the directory tree under `root` in the background.
    pub fn start_tree(
        &self,
        root: PathBuf,
        limits: TraversalLimits,
        threads: usize,
    ) -> Result<ScanHandle<TreeScan>, ScanError> {
        self.spawn(move |sink, cancel| scan_tree(&root, limits, threads, sink, cancel))
    }

    fn spawn<T, F>(&self, work: F) -> Result<ScanHandle<T>, ScanError>
    where
        T: ScanSnapshot,
        F: FnOnce(&dyn ProgressSink, &Arc<AtomicBool>) -> T + Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::AlreadyRunning);
        }
        // If spawning fails the closure is dropped and the guard with it.
        let guard = InFlightGuard(self.in_flight.clone());

        let (progress_tx, progress_rx) =
            crossbeam_channel::bounded::<ScanProgress<T>>(PROGRESS_CHANNEL_CAPACITY);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let cancel_clone = cancel_flag.clone();

        let thread = thread::Builder::new()
            .name("diskreclaim-scanner".into())
            .spawn(move || {
                let sink = ChannelSink::new(progress_tx.clone());
                let snapshot = work(&sink, &cancel_clone);
                let cancelled = snapshot.was_cancelled();
                // Release before publishing so a receiver that reacts to the
                // terminal message can start the next job immediately.
                drop(guard);
                let message = if cancelled {
                    debug!("Scanner publishing cancelled snapshot");
                    ScanProgress::Cancelled(snapshot)
                } else {
                    ScanProgress::Complete(snapshot)
                };
                let _ = progress_tx.send(message);
            })?;

        Ok(ScanHandle {
            progress_rx,
            cancel_flag,
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn request_for(dir: &std::path::Path) -> ScanRequest {
        ScanRequest::new(
            "test",
            vec![ScanRoot::recursive(dir, TraversalLimits::unbounded())],
        )
    }

    #[test]
    fn empty_request_is_rejected() {
        let scanner = Scanner::new();
        let result = scanner.start(ScanRequest::new("empty", Vec::new()));
        assert!(matches!(result, Err(ScanError::EmptyRequest)));
        assert!(!scanner.is_busy());
    }

    #[test]
    fn rescan_without_history_fails() {
        let scanner = Scanner::new();
        assert!(matches!(scanner.rescan(), Err(ScanError::NoPreviousRequest)));
    }

    #[test]
    fn guard_is_released_after_completion() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a"), [0u8; 10]).unwrap();
        let scanner = Scanner::new();

        let outcome = scanner.start(request_for(tmp.path())).unwrap().wait().unwrap();
        assert!(!outcome.cancelled);
        assert!(!scanner.is_busy());

        let again = scanner.rescan().unwrap().wait().unwrap();
        assert_eq!(again.items.len(), outcome.items.len());
    }

    #[test]
    fn second_start_while_running_is_refused() {
        let tmp = TempDir::new().unwrap();
        let scanner = Scanner::new();
        // Hold the flag as a running job would.
        scanner.in_flight.store(true, Ordering::Release);
        let result = scanner.start(request_for(tmp.path()));
        assert!(matches!(result, Err(ScanError::AlreadyRunning)));
        scanner.in_flight.store(false, Ordering::Release);
        assert!(scanner.start(request_for(tmp.path())).is_ok());
    }

    #[test]
    fn refused_start_keeps_the_previous_request() {
        let tmp = TempDir::new().unwrap();
        let scanner = Scanner::new();
        *scanner.last_request.lock() = Some(ScanRequest::new(
            "running",
            vec![ScanRoot::recursive(tmp.path(), TraversalLimits::unbounded())],
        ));
        scanner.in_flight.store(true, Ordering::Release);

        let refused = scanner.start(ScanRequest::new(
            "refused",
            vec![ScanRoot::recursive(tmp.path(), TraversalLimits::unbounded())],
        ));
        assert!(matches!(refused, Err(ScanError::AlreadyRunning)));
        let label = scanner.last_request.lock().as_ref().map(|r| r.label.clone());
        assert_eq!(label.as_deref(), Some("running"));

        scanner.in_flight.store(false, Ordering::Release);
        let again = scanner.rescan().unwrap().wait().unwrap();
        assert!(!again.cancelled);
        assert_eq!(
            scanner.last_request.lock().as_ref().map(|r| r.label.clone()).as_deref(),
            Some("running")
        );
    }
}
