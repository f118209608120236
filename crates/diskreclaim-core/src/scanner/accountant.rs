/// Size accountant: byte size of a file, or the bounded recursive size of a
/// directory subtree.
///
/// Availability over completeness: unreadable entries contribute zero, a
/// wholly unreadable root is size 0, and item caps silently undercount.
/// Every size returned here is a lower bound.
use super::roots::{walker, TraversalLimits};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Entries walked between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

#[derive(Debug, Clone)]
pub struct SizeAccountant {
    limits: TraversalLimits,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl SizeAccountant {
    pub fn new(limits: TraversalLimits) -> Self {
        Self {
            limits,
            cancel_flag: None,
        }
    }

    /// Stop walking early once `flag` is set. The partial sum is returned.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn limits(&self) -> &TraversalLimits {
        &self.limits
    }

    /// Size of `path` in bytes. Never fails.
    ///
    /// Symlinks are sized as links, never followed.
    pub fn size_of(&self, path: &Path) -> u64 {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => self.directory_size(path),
            Ok(meta) => meta.len(),
            Err(err) => {
                trace!("Unreadable, counted as 0: {}: {err}", path.display());
                0
            }
        }
    }

    fn directory_size(&self, root: &Path) -> u64 {
        let mut total: u64 = 0;

        for (n, entry_result) in walker(root, self.limits, 1, None).into_iter().enumerate() {
            if n % CANCEL_CHECK_INTERVAL == 0 && self.is_cancelled() {
                trace!("Sizing of {} cancelled", root.display());
                break;
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    trace!("Skipping unreadable entry under {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => total = total.saturating_add(meta.len()),
                Err(err) => trace!("Skipping {}: {err}", entry.path().display()),
            }
        }
        total
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, n: usize) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(&vec![7u8; n]).unwrap();
    }

    #[test]
    fn file_size_is_its_length() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.bin");
        write_bytes(&file, 1234);
        let accountant = SizeAccountant::new(TraversalLimits::unbounded());
        assert_eq!(accountant.size_of(&file), 1234);
    }

    #[test]
    fn directory_size_is_sum_of_children() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a"), 100);
        write_bytes(&tmp.path().join("b"), 200);
        fs::create_dir(tmp.path().join("sub")).unwrap();
        write_bytes(&tmp.path().join("sub").join("c"), 300);

        let accountant = SizeAccountant::new(TraversalLimits::unbounded());
        let children: u64 = ["a", "b", "sub"]
            .iter()
            .map(|c| accountant.size_of(&tmp.path().join(c)))
            .sum();
        assert_eq!(accountant.size_of(tmp.path()), 600);
        assert_eq!(children, 600);
    }

    #[test]
    fn missing_path_is_zero() {
        let tmp = TempDir::new().unwrap();
        let accountant = SizeAccountant::new(TraversalLimits::default());
        assert_eq!(accountant.size_of(&tmp.path().join("nope")), 0);
    }

    #[test]
    fn item_cap_undercounts_by_name_order() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a"), 1);
        write_bytes(&tmp.path().join("b"), 10);
        write_bytes(&tmp.path().join("c"), 100);

        let accountant =
            SizeAccountant::new(TraversalLimits::unbounded().with_max_items_per_dir(2));
        assert_eq!(accountant.size_of(tmp.path()), 11);
    }

    #[test]
    fn hidden_and_package_skipping() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join(".hidden"), 50);
        write_bytes(&tmp.path().join("shown"), 5);
        let bundle = tmp.path().join("Tool.app");
        fs::create_dir(&bundle).unwrap();
        write_bytes(&bundle.join("binary"), 500);

        let all = SizeAccountant::new(TraversalLimits::unbounded());
        assert_eq!(all.size_of(tmp.path()), 555);

        let bounded = SizeAccountant::new(
            TraversalLimits::unbounded()
                .with_skip_hidden(true)
                .with_skip_packages(true),
        );
        assert_eq!(bounded.size_of(tmp.path()), 5);
        // A package sized directly is still walked.
        assert_eq!(bounded.size_of(&bundle), 500);
    }

    #[test]
    fn depth_cap_limits_descent() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("top"), 1);
        let deep = tmp.path().join("d1").join("d2");
        fs::create_dir_all(&deep).unwrap();
        write_bytes(&deep.join("bottom"), 1000);

        let accountant = SizeAccountant::new(TraversalLimits::unbounded().with_max_depth(2));
        assert_eq!(accountant.size_of(tmp.path()), 1);
    }

    #[test]
    fn cancelled_accountant_stops_early() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a"), 10);
        let flag = Arc::new(AtomicBool::new(true));
        let accountant =
            SizeAccountant::new(TraversalLimits::unbounded()).with_cancel_flag(flag);
        assert_eq!(accountant.size_of(tmp.path()), 0);
    }
}
