/// Arena-backed file tree with O(n) bottom-up size aggregation.
///
/// Built by [`scan_tree`](crate::scanner::tree::scan_tree) and turned into
/// [`TreemapNode`](crate::treemap::TreemapNode)s for layout. The tree is the
/// only place where the "directory weight equals the sum of its children"
/// invariant is established; the treemap never re-validates it.
use super::file_node::{FileNode, NodeIndex};
use compact_str::CompactString;
use std::path::{Path, PathBuf};

/// The complete file tree produced by a tree scan.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    /// Arena: every node in a flat vector, parents before children.
    pub nodes: Vec<FileNode>,

    /// Root node indices, one per scanned folder.
    pub roots: Vec<NodeIndex>,

    /// Absolute path of each root, parallel to `roots`.
    pub root_paths: Vec<PathBuf>,

    /// Total logical size across all roots.
    pub total_size: u64,
}

impl FileTree {
    /// Create an empty tree with pre-allocated capacity.
    pub fn with_capacity(estimated_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(estimated_nodes),
            ..Self::default()
        }
    }

    /// Allocate a new node in the arena and return its index.
    pub fn add_node(&mut self, node: FileNode) -> NodeIndex {
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    /// Add a root directory to the tree.
    pub fn add_root(&mut self, path: &Path) -> NodeIndex {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let idx = self.add_node(FileNode::new_dir(CompactString::new(&name), None));
        self.roots.push(idx);
        self.root_paths.push(path.to_path_buf());
        idx
    }

    /// Attach `child` as a child of `parent`, prepending to the sibling list.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        let old_first = self.nodes[parent.idx()].first_child;
        self.nodes[child.idx()].next_sibling = old_first;
        self.nodes[child.idx()].parent = Some(parent);
        self.nodes[parent.idx()].first_child = Some(child);
    }

    /// Compute directory sizes and descendant counts in a single bottom-up pass.
    ///
    /// Children are always inserted after their parent, so iterating in
    /// reverse visits every child before its parent. Safe to call repeatedly:
    /// directory fields are reset first.
    pub fn aggregate_sizes(&mut self) {
        for node in self.nodes.iter_mut().filter(|n| n.is_dir) {
            node.size = 0;
            node.descendant_count = 0;
        }

        for i in (0..self.nodes.len()).rev() {
            let node = &self.nodes[i];
            let (size, count) = if node.is_dir {
                (node.size, node.descendant_count)
            } else {
                (node.size, 1)
            };
            if let Some(parent) = node.parent {
                let parent = &mut self.nodes[parent.idx()];
                parent.size += size;
                parent.descendant_count += count;
            }
        }

        self.total_size = self.roots.iter().map(|r| self.nodes[r.idx()].size).sum();
    }

    /// Reconstruct the full path for a node by walking up to its root.
    pub fn full_path(&self, index: NodeIndex) -> PathBuf {
        let mut segments = Vec::new();
        let mut current = index;
        loop {
            let node = &self.nodes[current.idx()];
            match node.parent {
                Some(parent) => {
                    segments.push(node.name.as_str());
                    current = parent;
                }
                None => break,
            }
        }

        let mut path = self
            .roots
            .iter()
            .position(|&r| r == current)
            .map(|pos| self.root_paths[pos].clone())
            .unwrap_or_else(|| PathBuf::from(self.nodes[current.idx()].name.as_str()));
        for segment in segments.into_iter().rev() {
            path.push(segment);
        }
        path
    }

    /// Direct children of a node sorted by size descending, name ascending
    /// on ties so the order is deterministic.
    pub fn children_sorted_by_size(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        let mut children = self.children(parent);
        children.sort_unstable_by(|a, b| {
            let a_node = &self.nodes[a.idx()];
            let b_node = &self.nodes[b.idx()];
            b_node
                .size
                .cmp(&a_node.size)
                .then_with(|| a_node.name.cmp(&b_node.name))
        });
        children
    }

    /// Direct children of a node (unsorted).
    pub fn children(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        let mut children = Vec::new();
        let mut child = self.nodes[parent.idx()].first_child;
        while let Some(idx) = child {
            children.push(idx);
            child = self.nodes[idx.idx()].next_sibling;
        }
        children
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &FileNode {
        &self.nodes[index.idx()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Placeholders for entries that could not be read, in arena order.
    pub fn unreadable(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_error)
            .map(|(i, _)| NodeIndex::new(i))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(tree: &mut FileTree, parent: NodeIndex, name: &str, size: u64) -> NodeIndex {
        let idx = tree.add_node(FileNode::new_file(CompactString::new(name), size, Some(parent)));
        tree.add_child(parent, idx);
        idx
    }

    #[test]
    fn aggregation_sums_children() {
        let mut tree = FileTree::with_capacity(10);
        let root = tree.add_root(Path::new("/scan"));
        let dir = tree.add_node(FileNode::new_dir(CompactString::new("Users"), Some(root)));
        tree.add_child(root, dir);
        file(&mut tree, dir, "a.txt", 100);
        file(&mut tree, dir, "b.txt", 200);
        file(&mut tree, root, "c.txt", 5);

        tree.aggregate_sizes();

        assert_eq!(tree.node(dir).size, 300);
        assert_eq!(tree.node(root).size, 305);
        assert_eq!(tree.node(dir).descendant_count, 2);
        assert_eq!(tree.node(root).descendant_count, 3);
        assert_eq!(tree.total_size, 305);
    }

    #[test]
    fn unreadable_entries_are_listed_and_weigh_nothing() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.add_root(Path::new("/scan"));
        file(&mut tree, root, "ok", 10);
        let locked = tree.add_node(FileNode::new_error(CompactString::new("locked"), true, Some(root)));
        tree.add_child(root, locked);
        tree.aggregate_sizes();

        assert_eq!(tree.unreadable().collect::<Vec<_>>(), vec![locked]);
        assert_eq!(tree.full_path(locked), PathBuf::from("/scan/locked"));
        assert_eq!(tree.node(root).size, 10);
        assert_eq!(tree.node(root).descendant_count, 1);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let mut tree = FileTree::with_capacity(3);
        let root = tree.add_root(Path::new("/scan"));
        file(&mut tree, root, "a", 7);
        tree.aggregate_sizes();
        tree.aggregate_sizes();
        assert_eq!(tree.node(root).size, 7);
    }

    #[test]
    fn full_path_starts_at_root_path() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.add_root(Path::new("/home/user"));
        let dir = tree.add_node(FileNode::new_dir(CompactString::new("docs"), Some(root)));
        tree.add_child(root, dir);
        let f = file(&mut tree, dir, "test.txt", 50);

        assert_eq!(tree.full_path(f), PathBuf::from("/home/user/docs/test.txt"));
        assert_eq!(tree.full_path(root), PathBuf::from("/home/user"));
    }

    #[test]
    fn children_sorted_by_size_then_name() {
        let mut tree = FileTree::with_capacity(5);
        let root = tree.add_root(Path::new("/scan"));
        let small = file(&mut tree, root, "small.txt", 10);
        let big = file(&mut tree, root, "big.bin", 1000);
        let tie_b = file(&mut tree, root, "b", 10);

        let sorted = tree.children_sorted_by_size(root);
        assert_eq!(sorted, vec![big, tie_b, small]);
    }
}
