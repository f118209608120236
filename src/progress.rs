//! Terminal progress rendering with indicatif.
//!
//! Engine operations report a `(fraction, status)` pair; the bar shows the
//! fraction on a fixed 0..=1000 scale with the status as its message. One
//! bar is created per operation and cleared when the operation ends.

use anyhow::{Context, Result};
use diskreclaim_core::scanner::{ProgressSink, ScanHandle, ScanProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::warn;

/// Bar positions per unit of reported progress.
const SCALE: u64 = 1_000;

pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    /// A visible bar, or a hidden one when `quiet` is set.
    pub fn new(quiet: bool) -> Self {
        if quiet {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(SCALE);
        bar.set_style(Self::style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] [{bar:30.cyan/blue}] {percent:>3}% {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    /// Block on `handle`, drawing its updates, and return the snapshot.
    pub fn wait<T>(self, mut handle: ScanHandle<T>) -> Result<T> {
        let snapshot = handle.wait_with(|message| match message {
            ScanProgress::Update { fraction, status } => self.report(*fraction, status),
            ScanProgress::RootError(error) => self.bar.suspend(|| warn!("Skipped {error}")),
            ScanProgress::Complete(_) | ScanProgress::Cancelled(_) => {}
        });
        self.finish();
        snapshot.context("the scanner stopped without publishing a result")
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for TerminalProgress {
    fn report(&self, fraction: f64, status: &str) {
        let position = (fraction.clamp(0.0, 1.0) * SCALE as f64).round() as u64;
        self.bar.set_position(position);
        self.bar.set_message(status.to_string());
    }
}
