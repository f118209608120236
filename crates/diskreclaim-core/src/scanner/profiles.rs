/// Concrete scanners expressed as parameterisations of the one generic
/// pipeline: a root set, a filter, a sort key and a selection policy.
use super::external::{package_cache_dir, CommandRunner, ToolReport};
use super::pipeline::{ScanFilter, ScanRequest, SortKey};
use super::roots::{ScanRoot, TraversalLimits};
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Results kept by the large-files scanner.
const LARGE_FILES_MAX_RESULTS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanKind {
    Junk,
    LargeFiles,
    AppContainers,
    DeveloperCaches,
    Downloads,
}

impl ScanKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Junk => "junk",
            Self::LargeFiles => "large files",
            Self::AppContainers => "app containers",
            Self::DeveloperCaches => "developer caches",
            Self::Downloads => "downloads",
        }
    }

    /// Whether results start out selected. Only junk is pre-selected.
    pub fn preselects(self) -> bool {
        matches!(self, Self::Junk)
    }
}

/// Build the pipeline request for `kind`.
///
/// Candidate roots are resolved against `home`; roots that do not exist on
/// this machine are left out rather than reported, since each profile lists
/// locations for several platforms.
pub fn build_request(
    kind: ScanKind,
    config: &EngineConfig,
    home: &Path,
    runner: &dyn CommandRunner,
) -> ScanRequest {
    let shallow = config.shallow_limits;
    let deep = config.deep_limits;

    let request = match kind {
        ScanKind::Junk => ScanRequest::new(
            kind.label(),
            existing_children(
                home,
                &["Library/Caches", "Library/Logs", ".cache"],
                shallow,
            ),
        )
        .with_filter(ScanFilter::default().include_dirs(true).min_size(1)),
        ScanKind::LargeFiles => ScanRequest::new(
            kind.label(),
            vec![ScanRoot::recursive(home, deep)],
        )
        .with_filter(ScanFilter::default().min_size(config.large_file_min_size))
        .with_max_results(LARGE_FILES_MAX_RESULTS),
        ScanKind::AppContainers => ScanRequest::new(
            kind.label(),
            existing_children(home, &["Library/Containers", ".var/app"], shallow),
        )
        .with_filter(ScanFilter::default().include_dirs(true).min_size(1)),
        ScanKind::DeveloperCaches => {
            let mut roots = existing_children(
                home,
                &[
                    "Library/Developer/Xcode/DerivedData",
                    "Library/Developer/Xcode/Archives",
                    "Library/Developer/CoreSimulator/Caches",
                    ".npm/_cacache",
                    ".gradle/caches",
                    ".cargo/registry",
                    ".cache/pip",
                ],
                shallow,
            );
            if let ToolReport::Available(dir) = package_cache_dir(runner) {
                if dir.is_dir() && !roots.iter().any(|r| r.path == dir) {
                    roots.push(ScanRoot::children(dir, shallow));
                }
            }
            ScanRequest::new(kind.label(), roots)
                .with_filter(ScanFilter::default().include_dirs(true).min_size(1))
        }
        ScanKind::Downloads => ScanRequest::new(
            kind.label(),
            existing_children(home, &["Downloads"], shallow),
        )
        .with_filter(
            ScanFilter::default()
                .include_dirs(true)
                .min_age_days(config.download_min_age_days),
        ),
    };

    request
        .with_sort(SortKey::SizeDescending)
        .with_preselect(kind.preselects())
}

fn existing_children(home: &Path, relative: &[&str], limits: TraversalLimits) -> Vec<ScanRoot> {
    relative
        .iter()
        .map(|rel| home.join(rel))
        .filter(|path| {
            let exists = path.is_dir();
            if !exists {
                debug!("Profile root not present: {}", path.display());
            }
            exists
        })
        .map(|path: PathBuf| ScanRoot::children(path, limits))
        .collect()
}
