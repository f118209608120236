/// Treemap layout: partition a rectangle into sub-rectangles whose areas
/// are proportional to item weights.
///
/// The layout is a strip alternation, not a ratio-optimising squarified
/// treemap. Each item takes a full-length strip off the remaining
/// rectangle, and the cut direction flips after every item. The first cut
/// runs across the longer side. Callers pass items sorted by descending
/// weight for the most even aspect ratios; the layout itself keeps input
/// order.
///
/// Nested layouts go one directory level at a time: a directory's children
/// are laid out inside the rectangle the directory received from its
/// parent.
use crate::model::{FileTree, NodeIndex};
use serde::Serialize;
use std::path::PathBuf;

/// Axis-aligned rectangle in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Area shared with `other`. Touching edges do not count.
    pub fn overlap(&self, other: &Rect) -> f64 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }
}

fn usable(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0
}

/// Lay out `weights` inside `bounds`, one rectangle per weight, in input
/// order.
///
/// An empty list or a non-positive total yields no rectangles. Items with
/// a zero, negative or non-finite weight get a zero-area rectangle at the
/// current corner so the output still lines up with the input. The last
/// positive item takes whatever remains, which keeps the total area equal
/// to `bounds.area()` despite rounding.
pub fn layout(weights: &[f64], bounds: Rect) -> Vec<Rect> {
    let total: f64 = weights.iter().copied().filter(|w| usable(*w)).sum();
    if weights.is_empty() || total <= 0.0 {
        return Vec::new();
    }
    let last_positive = weights.iter().rposition(|w| usable(*w));

    let bounds_area = bounds.area().max(0.0);
    let mut remaining = Rect {
        width: bounds.width.max(0.0),
        height: bounds.height.max(0.0),
        ..bounds
    };
    // Columns first when the bounds are wide, rows first when tall.
    let mut columns = remaining.width >= remaining.height;
    let mut rects = Vec::with_capacity(weights.len());

    for (i, &weight) in weights.iter().enumerate() {
        if !usable(weight) {
            rects.push(Rect::new(remaining.x, remaining.y, 0.0, 0.0));
            continue;
        }
        if Some(i) == last_positive {
            rects.push(remaining);
            remaining = Rect::new(
                remaining.x + remaining.width,
                remaining.y + remaining.height,
                0.0,
                0.0,
            );
            continue;
        }

        let area = weight / total * bounds_area;
        if columns {
            let width = if remaining.height > 0.0 {
                (area / remaining.height).min(remaining.width)
            } else {
                0.0
            };
            rects.push(Rect::new(remaining.x, remaining.y, width, remaining.height));
            remaining.x += width;
            remaining.width -= width;
        } else {
            let height = if remaining.width > 0.0 {
                (area / remaining.width).min(remaining.height)
            } else {
                0.0
            };
            rects.push(Rect::new(remaining.x, remaining.y, remaining.width, height));
            remaining.y += height;
            remaining.height -= height;
        }
        columns = !columns;
    }

    rects
}

/// A weighted node of the treemap hierarchy. `children == None` marks a
/// leaf; a directory cut off by the depth limit is a leaf too.
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapNode {
    pub path: PathBuf,
    pub name: String,
    pub weight: u64,
    pub is_dir: bool,
    pub children: Option<Vec<TreemapNode>>,
}

impl TreemapNode {
    pub fn leaf(path: impl Into<PathBuf>, weight: u64) -> Self {
        let path = path.into();
        Self {
            name: crate::model::entry::display_name(&path),
            path,
            weight,
            is_dir: false,
            children: None,
        }
    }

    /// A directory whose weight is the sum of `children`.
    pub fn dir(path: impl Into<PathBuf>, mut children: Vec<TreemapNode>) -> Self {
        let path = path.into();
        children.sort_by(|a, b| b.weight.cmp(&a.weight));
        Self {
            name: crate::model::entry::display_name(&path),
            path,
            weight: children.iter().map(|c| c.weight).sum(),
            is_dir: true,
            children: Some(children),
        }
    }

    /// Build the hierarchy below `index` from an aggregated tree, down to
    /// `max_depth` levels. Zero-size children are dropped and the rest are
    /// sorted by descending weight.
    pub fn from_tree(tree: &FileTree, index: NodeIndex, max_depth: usize) -> Self {
        let node = tree.node(index);
        let children = (node.is_dir && max_depth > 0).then(|| {
            tree.children_sorted_by_size(index)
                .into_iter()
                .filter(|&child| tree.node(child).size > 0)
                .map(|child| Self::from_tree(tree, child, max_depth - 1))
                .collect::<Vec<_>>()
        });
        Self {
            path: tree.full_path(index),
            name: node.name.to_string(),
            weight: node.size,
            is_dir: node.is_dir,
            children,
        }
    }
}

/// One rectangle of a nested layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedRect {
    pub path: PathBuf,
    pub name: String,
    pub weight: u64,
    pub is_dir: bool,
    /// 0 for the children of the laid-out node.
    pub depth: usize,
    pub rect: Rect,
}

/// Lay out `node`'s descendants inside `bounds`, recursing at most
/// `max_depth` levels. Parents come before their children in the output.
pub fn layout_nested(node: &TreemapNode, bounds: Rect, max_depth: usize) -> Vec<PlacedRect> {
    let mut placed = Vec::new();
    place_children(node, bounds, 0, max_depth, &mut placed);
    placed
}

fn place_children(
    node: &TreemapNode,
    bounds: Rect,
    depth: usize,
    max_depth: usize,
    placed: &mut Vec<PlacedRect>,
) {
    let Some(children) = node.children.as_deref() else {
        return;
    };
    if depth >= max_depth || bounds.is_empty() {
        return;
    }

    let weights: Vec<f64> = children.iter().map(|c| c.weight as f64).collect();
    for (child, rect) in children.iter().zip(layout(&weights, bounds)) {
        if rect.is_empty() {
            continue;
        }
        placed.push(PlacedRect {
            path: child.path.clone(),
            name: child.name.clone(),
            weight: child.weight,
            is_dir: child.is_dir,
            depth,
            rect,
        });
        place_children(child, rect, depth + 1, max_depth, placed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn total_area(rects: &[Rect]) -> f64 {
        rects.iter().map(Rect::area).sum()
    }

    fn assert_disjoint(rects: &[Rect]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(a.overlap(b) < EPS, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn three_items_in_wide_bounds() {
        let rects = layout(&[50.0, 30.0, 20.0], Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(rects.len(), 3);
        assert!((rects[0].area() - 2500.0).abs() < EPS);
        assert!((rects[1].area() - 1500.0).abs() < EPS);
        assert!((rects[2].area() - 1000.0).abs() < EPS);
        assert!((total_area(&rects) - 5000.0).abs() < EPS);
        assert_eq!(rects[0], Rect::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(rects[1], Rect::new(50.0, 0.0, 50.0, 30.0));
        assert_eq!(rects[2], Rect::new(50.0, 30.0, 50.0, 20.0));
        assert_disjoint(&rects);
    }

    #[test]
    fn tall_bounds_start_with_rows() {
        let rects = layout(&[1.0, 1.0], Rect::new(0.0, 0.0, 10.0, 40.0));
        assert_eq!(rects[0], Rect::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(rects[1], Rect::new(0.0, 20.0, 10.0, 20.0));
    }

    #[test]
    fn empty_input_gives_no_rects() {
        assert!(layout(&[], Rect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
        assert!(layout(&[0.0, 0.0], Rect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn single_item_fills_bounds() {
        let bounds = Rect::new(3.0, 4.0, 70.0, 20.0);
        for weight in [0.001, 1.0, 1e12] {
            assert_eq!(layout(&[weight], bounds), vec![bounds]);
        }
    }

    #[test]
    fn area_is_conserved_and_rects_do_not_overlap() {
        let weights: Vec<f64> = (1..=25).rev().map(|w| (w * w) as f64).collect();
        let bounds = Rect::new(10.0, 20.0, 640.0, 480.0);
        let rects = layout(&weights, bounds);
        assert_eq!(rects.len(), weights.len());
        assert!((total_area(&rects) - bounds.area()).abs() < 1e-6);
        assert_disjoint(&rects);
        for r in &rects {
            assert!(r.x >= bounds.x - EPS && r.y >= bounds.y - EPS);
            assert!(r.x + r.width <= bounds.x + bounds.width + EPS);
            assert!(r.y + r.height <= bounds.y + bounds.height + EPS);
        }
    }

    #[test]
    fn zero_weights_keep_their_slot() {
        let rects = layout(&[5.0, 0.0, 5.0], Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(rects.len(), 3);
        assert_eq!(rects[1].area(), 0.0);
        assert!((total_area(&rects) - 100.0).abs() < EPS);
    }

    #[test]
    fn zero_sized_bounds_do_not_panic() {
        let rects = layout(&[1.0, 2.0, 3.0], Rect::new(0.0, 0.0, 0.0, 10.0));
        assert_eq!(rects.len(), 3);
        assert_eq!(total_area(&rects), 0.0);
    }

    #[test]
    fn nested_layout_places_children_inside_parents() {
        let tree = TreemapNode::dir(
            "/r",
            vec![
                TreemapNode::dir(
                    "/r/a",
                    vec![TreemapNode::leaf("/r/a/1", 30), TreemapNode::leaf("/r/a/2", 10)],
                ),
                TreemapNode::leaf("/r/b", 60),
            ],
        );
        assert_eq!(tree.weight, 100);

        let placed = layout_nested(&tree, Rect::new(0.0, 0.0, 100.0, 100.0), 4);
        assert_eq!(placed.len(), 4);
        // Largest first after sorting.
        assert_eq!(placed[0].name, "b");
        assert!((placed[0].rect.area() - 6000.0).abs() < EPS);

        let a = placed.iter().find(|p| p.name == "a").unwrap();
        let depth_one: Vec<_> = placed.iter().filter(|p| p.depth == 1).collect();
        assert_eq!(depth_one.len(), 2);
        let inner: f64 = depth_one.iter().map(|p| p.rect.area()).sum();
        assert!((inner - a.rect.area()).abs() < EPS);
        for child in depth_one {
            assert!((child.rect.overlap(&a.rect) - child.rect.area()).abs() < EPS);
        }
    }

    #[test]
    fn nested_layout_respects_depth_limit() {
        let tree = TreemapNode::dir(
            "/r",
            vec![TreemapNode::dir("/r/a", vec![TreemapNode::leaf("/r/a/1", 5)])],
        );
        let placed = layout_nested(&tree, Rect::new(0.0, 0.0, 10.0, 10.0), 1);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].name, "a");
    }

    #[test]
    fn from_tree_drops_empty_children() {
        use crate::model::FileNode;
        use compact_str::CompactString;

        let mut tree = FileTree::with_capacity(8);
        let root = tree.add_root(std::path::Path::new("/data"));
        let big = tree.add_node(FileNode::new_file(CompactString::new("big"), 40, Some(root)));
        tree.add_child(root, big);
        let empty = tree.add_node(FileNode::new_file(CompactString::new("empty"), 0, Some(root)));
        tree.add_child(root, empty);
        let small = tree.add_node(FileNode::new_file(CompactString::new("small"), 2, Some(root)));
        tree.add_child(root, small);
        tree.aggregate_sizes();

        let node = TreemapNode::from_tree(&tree, root, 3);
        assert_eq!(node.weight, 42);
        let names: Vec<_> = node
            .children
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["big", "small"]);
    }
}
