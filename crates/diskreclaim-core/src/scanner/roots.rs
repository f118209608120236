/// Scan roots and the traversal limits that bound their cost.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory extensions that macOS presents as single opaque items.
const PACKAGE_EXTENSIONS: &[&str] = &[
    "app",
    "bundle",
    "framework",
    "plugin",
    "kext",
    "photoslibrary",
    "musiclibrary",
    "xcarchive",
    "xcodeproj",
    "xcworkspace",
    "appex",
];

/// Bounds applied while walking a directory tree.
///
/// The per-directory item cap is a CPU/latency bound, not an error: once a
/// directory has more entries than the cap, the entries past it (in name
/// order) are neither descended nor sized, so any size computed under a
/// cap is a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalLimits {
    /// Maximum depth below the root; `None` means unlimited.
    pub max_depth: Option<usize>,
    /// Maximum entries considered per directory; `None` means unlimited.
    pub max_items_per_dir: Option<usize>,
    /// Skip dot-files and dot-directories.
    pub skip_hidden: bool,
    /// Do not descend into bundle packages (`Foo.app` and friends).
    pub skip_packages: bool,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_items_per_dir: Some(5_000),
            skip_hidden: false,
            skip_packages: false,
        }
    }
}

impl TraversalLimits {
    /// No caps at all.
    pub fn unbounded() -> Self {
        Self {
            max_depth: None,
            max_items_per_dir: None,
            skip_hidden: false,
            skip_packages: false,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_max_items_per_dir(mut self, cap: usize) -> Self {
        self.max_items_per_dir = Some(cap);
        self
    }

    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    #[must_use]
    pub fn with_skip_packages(mut self, skip: bool) -> Self {
        self.skip_packages = skip;
        self
    }
}

/// How a root's candidates are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Enumeration {
    /// Each direct child (file or directory) is one candidate; directories
    /// are sized recursively.
    Children,
    /// Every file below the root is a candidate; directories are not.
    Recursive,
}

/// A directory to scan plus its traversal limits. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub limits: TraversalLimits,
    pub enumeration: Enumeration,
}

impl ScanRoot {
    pub fn new(path: impl Into<PathBuf>, limits: TraversalLimits, enumeration: Enumeration) -> Self {
        Self {
            path: path.into(),
            limits,
            enumeration,
        }
    }

    pub fn children(path: impl Into<PathBuf>, limits: TraversalLimits) -> Self {
        Self::new(path, limits, Enumeration::Children)
    }

    pub fn recursive(path: impl Into<PathBuf>, limits: TraversalLimits) -> Self {
        Self::new(path, limits, Enumeration::Recursive)
    }
}

/// Structural validation of a scan root: it must exist and be a directory.
/// The message is what gets reported for the root.
pub(crate) fn check_root(path: &Path) -> Result<(), String> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err("not a directory".to_string()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err("does not exist".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

/// `true` if the name has a dot-prefix.
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// `true` if the directory name carries a bundle-package extension.
pub fn is_package_name(name: &OsStr) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            PACKAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Apply per-directory limits to one batch of `read_dir` results.
///
/// Entries are ordered by name first so that truncation always drops the
/// same siblings. Returns `true` if the batch was truncated. The batch
/// holding the root itself (`depth == None`) is left alone.
pub(crate) fn apply_limits(
    limits: &TraversalLimits,
    depth: Option<usize>,
    children: &mut Vec<jwalk::Result<jwalk::DirEntry<((), ())>>>,
) -> bool {
    if depth.is_none() {
        return false;
    }
    if limits.skip_hidden {
        children.retain(|child| match child {
            Ok(entry) => !is_hidden_name(&entry.file_name),
            Err(_) => true,
        });
    }

    children.sort_by(|a, b| match (a, b) {
        (Ok(a), Ok(b)) => a.file_name.cmp(&b.file_name),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
    });

    let mut truncated = false;
    if let Some(cap) = limits.max_items_per_dir {
        if children.len() > cap {
            children.truncate(cap);
            truncated = true;
        }
    }

    if limits.skip_packages {
        for entry in children.iter_mut().flatten() {
            if entry.file_type.is_dir() && is_package_name(&entry.file_name) {
                entry.read_children_path = None;
            }
        }
    }

    truncated
}

/// Directories whose listing was cut short by the item cap.
pub(crate) type TruncationLog = Arc<Mutex<Vec<PathBuf>>>;

/// A configured `jwalk` walker honouring `limits`. The walker runs serially
/// unless `threads > 1`. Truncated directories are appended to `truncations`
/// when one is given.
pub(crate) fn walker(
    root: &Path,
    limits: TraversalLimits,
    threads: usize,
    truncations: Option<TruncationLog>,
) -> jwalk::WalkDir {
    let parallelism = if threads > 1 {
        jwalk::Parallelism::RayonNewPool(threads)
    } else {
        jwalk::Parallelism::Serial
    };

    let mut walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(parallelism)
        .process_read_dir(move |depth, path, _state, children| {
            if apply_limits(&limits, depth, children) {
                if let Some(log) = &truncations {
                    log.lock().push(path.to_path_buf());
                }
            }
        });
    if let Some(depth) = limits.max_depth {
        walker = walker.max_depth(depth);
    }
    walker
}
