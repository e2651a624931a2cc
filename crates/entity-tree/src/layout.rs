//! Pixel geometry of the tree view.
//!
//! Everything here is a pure function of the current tree state and the
//! [`TreeOptions`] metrics. Nothing is cached; a renderer recomputes the
//! layout on every pass.

use crate::options::TreeOptions;
use crate::tree::sort::sorted_children;
use crate::tree::{NodeId, Tree};

/// Height of a node's row plus, when expanded, every row below it.
///
/// Dropped nodes have no height.
pub fn subtree_height<T: Tree>(tree: &T, id: NodeId, options: &TreeOptions) -> f32 {
    let Some(node) = tree.get(id) else {
        return 0.0;
    };

    let mut height = options.item_height;
    if node.expand {
        height += node
            .entities
            .values()
            .map(|&child| subtree_height(tree, child, options))
            .sum::<f32>();
    }
    height
}

/// Length of the guide line drawn from an expanded node to its last child.
pub fn outline_height<T: Tree>(tree: &T, id: NodeId, options: &TreeOptions) -> f32 {
    (subtree_height(tree, id, options) - options.item_height - options.outline_inset).max(0.0)
}

/// Height of the whole scroll region.
pub fn tree_height<T: Tree>(tree: &T, options: &TreeOptions) -> f32 {
    subtree_height(tree, tree.root(), options) + options.bottom_padding
}

/// Width of a row's selection box at horizontal offset `x`.
pub fn select_box_width(x: f32, width: f32, options: &TreeOptions) -> f32 {
    (width - x - options.select_box_inset).max(0.0)
}

/// A single row of the laid-out tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeRow {
    pub node: NodeId,
    /// Nesting level; children of the root are at depth 0.
    pub depth: usize,
    /// Left edge of the row.
    pub x: f32,
    /// Top of the row.
    pub y: f32,
    /// Guide line length below this row, present when the row is expanded.
    pub outline: Option<f32>,
}

/// Flatten the visible part of the tree into rows, in display order.
///
/// The root itself is not drawn; its children start at `top_margin`. Each
/// expanded node is followed by its sorted children, indented one level.
pub fn visible_rows<T: Tree>(tree: &T, options: &TreeOptions) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    layout_scope(tree, tree.root(), 0, 0.0, options.top_margin, options, &mut rows);
    rows
}

fn layout_scope<T: Tree>(
    tree: &T,
    scope: NodeId,
    depth: usize,
    x: f32,
    y: f32,
    options: &TreeOptions,
    rows: &mut Vec<TreeRow>,
) -> f32 {
    let mut height = y;

    for child in sorted_children(tree, scope) {
        let expanded = tree.is_expanded(child);
        rows.push(TreeRow {
            node: child,
            depth,
            x,
            y: height,
            outline: expanded.then(|| outline_height(tree, child, options)),
        });

        if expanded {
            layout_scope(
                tree,
                child,
                depth + 1,
                x + options.indent_width,
                height + options.item_height,
                options,
                rows,
            );
            height += subtree_height(tree, child, options);
        } else {
            height += options.item_height;
        }
    }

    height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{EntityTree, TreeNode};
    use pretty_assertions::assert_eq;

    // root
    //   a (expanded)
    //     x
    //     y
    //   b
    fn build() -> (EntityTree, NodeId, NodeId) {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, TreeNode::new("a", "a"));
        let b = tree.insert_child(root, TreeNode::new("b", "b"));
        tree.insert_child(a, TreeNode::new("x", "a.x"));
        tree.insert_child(a, TreeNode::new("y", "a.y"));
        tree.node_mut(a).unwrap().expand = true;
        (tree, a, b)
    }

    #[test]
    fn test_subtree_height() {
        let options = TreeOptions::default();
        let (mut tree, a, b) = build();

        assert_eq!(subtree_height(&tree, b, &options), 26.0);
        assert_eq!(subtree_height(&tree, a, &options), 78.0);
        assert_eq!(subtree_height(&tree, tree.root(), &options), 130.0);
        assert_eq!(tree_height(&tree, &options), 230.0);

        tree.node_mut(a).unwrap().expand = false;
        assert_eq!(subtree_height(&tree, tree.root(), &options), 78.0);
    }

    #[test]
    fn test_outline_height() {
        let options = TreeOptions::default();
        let (tree, a, b) = build();
        assert_eq!(outline_height(&tree, a, &options), 45.0);
        assert_eq!(outline_height(&tree, b, &options), 0.0);
    }

    #[test]
    fn test_select_box_width() {
        let options = TreeOptions::default();
        assert_eq!(select_box_width(12.0, 215.0, &options), 174.0);
        assert_eq!(select_box_width(200.0, 215.0, &options), 0.0);
    }

    #[test]
    fn test_visible_rows() {
        let options = TreeOptions::default();
        let (tree, a, b) = build();
        let x = tree.child(a, "x").unwrap();
        let y = tree.child(a, "y").unwrap();

        let rows = visible_rows(&tree, &options);
        let summary: Vec<_> = rows.iter().map(|r| (r.node, r.depth, r.x, r.y)).collect();
        assert_eq!(
            summary,
            vec![
                (a, 0, 0.0, 20.0),
                (x, 1, 12.0, 46.0),
                (y, 1, 12.0, 72.0),
                (b, 0, 0.0, 98.0),
            ]
        );
        assert_eq!(rows[0].outline, Some(45.0));
        assert_eq!(rows[3].outline, None);
    }

    #[test]
    fn test_rows_follow_sort_order() {
        let options = TreeOptions::default();
        let (mut tree, a, b) = build();
        tree.node_mut(b).unwrap().is_module = true;

        let rows = visible_rows(&tree, &options);
        assert_eq!(rows[0].node, b);
        assert_eq!(rows[1].node, a);
        assert_eq!(rows[1].y, 46.0);
    }
}
