/// A single node in the arena-allocated file tree.
///
/// Nodes are stored in a flat `Vec<FileNode>`. Parent-child relationships
/// use indices rather than pointers, so the tree can be cloned into a
/// snapshot and handed across threads without aliasing.
use compact_str::CompactString;
use std::time::SystemTime;

/// Lightweight index into the arena `Vec<FileNode>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A single file or directory in the tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Entry name only. Full paths are rebuilt by walking up via `parent`.
    pub name: CompactString,

    /// Logical size in bytes. For directories this is the sum of all
    /// descendant file sizes after [`FileTree::aggregate_sizes`] has run.
    ///
    /// [`FileTree::aggregate_sizes`]: super::FileTree::aggregate_sizes
    pub size: u64,

    pub is_dir: bool,

    /// `None` for scan roots.
    pub parent: Option<NodeIndex>,

    /// First child (directories only); siblings are chained through
    /// [`next_sibling`](Self::next_sibling).
    pub first_child: Option<NodeIndex>,

    pub next_sibling: Option<NodeIndex>,

    /// Number of descendant files (not directories).
    pub descendant_count: u64,

    pub modified: Option<SystemTime>,

    /// `true` if the entry could not be read. It stays in the tree with size 0.
    pub is_error: bool,

    /// `true` if this directory hit the per-directory item cap, so its size
    /// is an undercount.
    pub truncated: bool,
}

impl FileNode {
    /// Create a new file node with the given name and size.
    pub fn new_file(name: CompactString, size: u64, parent: Option<NodeIndex>) -> Self {
        Self {
            name,
            size,
            is_dir: false,
            parent,
            first_child: None,
            next_sibling: None,
            descendant_count: 0,
            modified: None,
            is_error: false,
            truncated: false,
        }
    }

    /// Create a new directory node.
    pub fn new_dir(name: CompactString, parent: Option<NodeIndex>) -> Self {
        Self {
            is_dir: true,
            ..Self::new_file(name, 0, parent)
        }
    }

    /// Create a placeholder for an unreadable entry.
    pub fn new_error(name: CompactString, is_dir: bool, parent: Option<NodeIndex>) -> Self {
        Self {
            is_dir,
            is_error: true,
            ..Self::new_file(name, 0, parent)
        }
    }
}
