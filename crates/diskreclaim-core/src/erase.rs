/// Secure erase: overwrite a file's content in place several times, then
/// unlink it.
///
/// Pass `n` writes a pattern chosen by `n % 3`: all zeros, all ones
/// (`0xFF`), then uniform random bytes. Each pass covers the file in 1 MiB
/// chunks from offset 0 and is synced to storage before the next begins.
///
/// # Limits
///
/// A logical overwrite is not guaranteed to reach the physical blocks that
/// held the data. Copy-on-write file systems (APFS, btrfs, ZFS), journaled
/// file systems and flash storage with wear levelling may keep the old
/// content elsewhere. More passes do not change that. Treat a successful
/// shred as "not recoverable by ordinary means", not as forensic-grade
/// erasure.
///
/// Shredded files never go through the trash.
use crate::actions::ActionResult;
use crate::model::size::format_size;
use crate::scanner::progress::{MonotonicProgress, ProgressSink};
use rand::RngCore;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bytes written per `write` call.
pub const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ShredError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("cannot inspect {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("an erase plan needs at least one pass")]
    ZeroPasses,

    #[error("overwrite of {path} failed on pass {pass}: {source}")]
    Overwrite {
        path: PathBuf,
        pass: u32,
        #[source]
        source: io::Error,
    },

    /// The content is already destroyed; only the directory entry remains.
    #[error("{path} was overwritten but could not be removed: {source}")]
    Unlink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Byte pattern written by one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Zeros,
    Ones,
    Random,
}

impl Pattern {
    pub fn for_pass(pass: u32) -> Self {
        match pass % 3 {
            0 => Self::Zeros,
            1 => Self::Ones,
            _ => Self::Random,
        }
    }

    fn fill(self, buffer: &mut [u8], rng: &mut impl RngCore) {
        match self {
            Self::Zeros => buffer.fill(0x00),
            Self::Ones => buffer.fill(0xFF),
            Self::Random => rng.fill_bytes(buffer),
        }
    }
}

/// What a successful shred did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShredReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub passes: u32,
}

/// A validated erase target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasePlan {
    pub path: PathBuf,
    pub passes: u32,
    len: u64,
}

impl ErasePlan {
    /// Check the preconditions without touching the file's content.
    pub fn new(path: impl Into<PathBuf>, passes: u32) -> Result<Self, ShredError> {
        let path = path.into();
        if passes == 0 {
            return Err(ShredError::ZeroPasses);
        }
        // `symlink_metadata` so a link is refused instead of its target
        // being overwritten while only the link gets unlinked.
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ShredError::FileNotFound(path))
            }
            Err(source) => return Err(ShredError::Inspect { path, source }),
        };
        if !meta.is_file() {
            return Err(ShredError::NotAFile(path));
        }
        Ok(Self {
            len: meta.len(),
            path,
            passes,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrite, sync and unlink. Progress reaches 1.0 exactly once,
    /// after the unlink succeeds.
    pub fn execute(&self, sink: &dyn ProgressSink) -> Result<ShredReport, ShredError> {
        let progress = MonotonicProgress::new(sink);
        debug!(
            "Shredding {} ({}, {} passes)",
            self.path.display(),
            format_size(self.len),
            self.passes
        );

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|source| ShredError::Overwrite {
                path: self.path.clone(),
                pass: 0,
                source,
            })?;
        overwrite(&mut file, self.len, self.passes, &progress).map_err(|(pass, source)| {
            ShredError::Overwrite {
                path: self.path.clone(),
                pass,
                source,
            }
        })?;
        drop(file);

        fs::remove_file(&self.path).map_err(|source| ShredError::Unlink {
            path: self.path.clone(),
            source,
        })?;
        progress.report(1.0, "Shredded");

        Ok(ShredReport {
            path: self.path.clone(),
            bytes: self.len,
            passes: self.passes,
        })
    }
}

/// Overwrite `len` bytes of `file` `passes` times. On failure returns the
/// pass that failed.
fn overwrite(
    file: &mut File,
    len: u64,
    passes: u32,
    progress: &MonotonicProgress<'_>,
) -> Result<(), (u32, io::Error)> {
    let chunk_count = len.div_ceil(CHUNK_SIZE as u64).max(1);
    let mut buffer = vec![0u8; CHUNK_SIZE.min(len as usize).max(1)];
    let mut rng = rand::thread_rng();

    for pass in 0..passes {
        let pattern = Pattern::for_pass(pass);
        let fail = |e: io::Error| (pass, e);
        file.seek(SeekFrom::Start(0)).map_err(fail)?;

        let mut written: u64 = 0;
        for chunk in 0..chunk_count {
            let n = (len - written).min(buffer.len() as u64) as usize;
            if n > 0 {
                pattern.fill(&mut buffer[..n], &mut rng);
                file.write_all(&buffer[..n]).map_err(fail)?;
                written += n as u64;
            }

            let last = pass + 1 == passes && chunk + 1 == chunk_count;
            if !last {
                let fraction = (pass as f64 + (chunk + 1) as f64 / chunk_count as f64) / passes as f64;
                progress.report(fraction, &format!("Pass {} of {passes}", pass + 1));
            }
        }
        file.sync_all().map_err(fail)?;
    }
    Ok(())
}

/// Shred one file.
pub fn shred(path: &Path, passes: u32, sink: &dyn ProgressSink) -> Result<ShredReport, ShredError> {
    ErasePlan::new(path, passes)?.execute(sink)
}

/// Shred `paths` one after another.
///
/// A failure is recorded and the batch moves on to the next file.
/// Cancellation is checked between files only; a file whose first pass
/// has started is always finished.
pub fn shred_files(
    paths: &[PathBuf],
    passes: u32,
    sink: &dyn ProgressSink,
    cancel_flag: &AtomicBool,
) -> ActionResult {
    let progress = MonotonicProgress::new(sink);
    let mut result = ActionResult::default();
    let total = paths.len().max(1) as f64;

    info!("Shredding {} file(s) with {passes} pass(es)", paths.len());
    for (i, path) in paths.iter().enumerate() {
        if cancel_flag.load(Ordering::Relaxed) {
            result.skipped = paths.len() - i;
            info!("Shred batch cancelled, {} file(s) left untouched", result.skipped);
            break;
        }

        let start = i as f64 / total;
        let end = (i + 1) as f64 / total;
        let name = crate::model::entry::display_name(path);
        let file_sink = |f: f64, _status: &str| {
            progress.report_in(start, end, f, &format!("Shredding {name}"));
        };

        match shred(path, passes, &file_sink) {
            Ok(report) => result.record_success(report.bytes),
            Err(err) => {
                warn!("Shred failed: {err}");
                result.record_failure(path, err.to_string());
            }
        }
    }

    info!("Shred batch finished: {}", result.summary());
    result
}
