/// Ordinary deletion: move to the system trash, or remove permanently.
///
/// Both paths first re-check the item against what the scan saw. A file
/// whose modification time changed since the scan is refused rather than
/// deleted, so a stale result list cannot destroy fresh data.
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DeleteError {
    /// Gone already (deleted or moved since the scan).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("modified since scan: {0}")]
    Modified(PathBuf),

    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    #[error("permanent delete failed for {path}: {source}")]
    PermanentDeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// A completed deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub path: PathBuf,
    /// `false` when the item went to the trash.
    pub permanent: bool,
}

/// Verify `path` still exists and, for files, still carries the
/// modification time recorded by the scan. Returns whether it is a
/// directory.
fn check_unchanged(path: &Path, scanned_mtime: Option<SystemTime>) -> Result<bool, DeleteError> {
    let meta = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
    if meta.is_file() {
        if let (Some(expected), Ok(current)) = (scanned_mtime, meta.modified()) {
            if expected != current {
                warn!("Refusing to delete {}: modified since scan", path.display());
                return Err(DeleteError::Modified(path.to_path_buf()));
            }
        }
    }
    Ok(meta.is_dir())
}

/// Move `path` to the system trash.
pub fn delete_to_trash(path: &Path, scanned_mtime: Option<SystemTime>) -> Result<Deleted, DeleteError> {
    check_unchanged(path, scanned_mtime)?;
    trash::delete(path).map_err(|e| DeleteError::TrashFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!("Moved to trash: {}", path.display());
    Ok(Deleted {
        path: path.to_path_buf(),
        permanent: false,
    })
}

/// Remove `path` for good. Directories are removed recursively.
pub fn permanent_delete(path: &Path, scanned_mtime: Option<SystemTime>) -> Result<Deleted, DeleteError> {
    let is_dir = check_unchanged(path, scanned_mtime)?;
    let removed = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|source| DeleteError::PermanentDeleteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Permanently deleted: {}", path.display());
    Ok(Deleted {
        path: path.to_path_buf(),
        permanent: true,
    })
}

/// `true` if `path` already lives inside a desktop trash: freedesktop
/// `Trash/files` (home or `.Trash-<uid>` on other volumes) or macOS
/// `.Trash`/`.Trashes`. Trashing such an item frees nothing.
pub fn is_in_trash(path: &Path) -> bool {
    let names: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect();
    // The last component is the item itself; only its ancestors count.
    let Some((_, ancestors)) = names.split_last() else {
        return false;
    };
    ancestors.iter().any(|n| n == ".Trash" || n == ".Trashes")
        || ancestors
            .windows(2)
            .any(|w| (w[0] == "Trash" || w[0].starts_with(".Trash-")) && w[1] == "files")
}

/// Trash `path`, or delete it permanently if `permanent` is set, the item
/// is already in a trash, or the trash refuses it.
pub fn remove(path: &Path, scanned_mtime: Option<SystemTime>, permanent: bool) -> Result<Deleted, DeleteError> {
    if permanent {
        return permanent_delete(path, scanned_mtime);
    }
    if is_in_trash(path) {
        info!("{} is already in the trash, deleting permanently", path.display());
        return permanent_delete(path, scanned_mtime);
    }
    match delete_to_trash(path, scanned_mtime) {
        Err(DeleteError::TrashFailed { message, .. }) => {
            warn!(
                "Trash unavailable for {} ({message}), deleting permanently",
                path.display()
            );
            permanent_delete(path, scanned_mtime)
        }
        other => other,
    }
}
