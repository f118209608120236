/// Data model for the DiskReclaim engine.
///
/// - [`file_tree`] / [`file_node`]: arena tree built by the directory tree
///   scan and consumed by the treemap builder.
/// - [`entry`]: candidate entries and result rows produced by the scan
///   pipeline.
/// - [`size`]: byte and count formatting, size parsing.
pub mod entry;
pub mod file_node;
pub mod file_tree;
pub mod size;

pub use entry::{CandidateEntry, ScanResultItem};
pub use file_node::{FileNode, NodeIndex};
pub use file_tree::FileTree;
