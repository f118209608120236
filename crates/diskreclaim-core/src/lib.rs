/// DiskReclaim Core: scanning, reclamation and layout engine.
///
/// This crate contains all business logic with zero UI dependencies.
/// Frontends drive it through [`scanner::Scanner`], read the published
/// snapshots, and hand selections to [`actions::Coordinator`].
///
/// # Modules
///
/// - [`model`]: candidate entries, result items and the arena file tree.
/// - [`scanner`]: traversal limits, size accounting, the generic scan
///   pipeline, scanner profiles and the background worker.
/// - [`analysis`]: classification, age filtering and duplicate detection.
/// - [`treemap`]: strip-alternating treemap layout.
/// - [`erase`]: multi-pass overwrite and unlink.
/// - [`actions`]: selection state, trash, permanent delete.
/// - [`history`]: capped scan history over a key-value store.
/// - [`export`]: CSV export.
/// - [`config`]: engine tunables.
pub mod actions;
pub mod analysis;
pub mod config;
pub mod erase;
pub mod export;
pub mod history;
pub mod model;
pub mod scanner;
pub mod treemap;
