//! Navigation traits over the mirrored entity tree

use std::collections::HashSet;

use crate::tree::{path, NodeId, TreeNode};

/// Read access to a hierarchy of [`TreeNode`]s
///
/// Implementations provide node lookup; the derived methods walk scopes by
/// name and never assume a scope has been fetched. A stale `expand` flag on a
/// node whose children are gone simply yields no children.
pub trait Tree {
    /// Get the root node ID (always exists)
    fn root(&self) -> NodeId;

    /// Get a node by its ID
    ///
    /// Returns `None` if the node has been dropped.
    fn get(&self, id: NodeId) -> Option<&TreeNode>;

    /// Count live nodes, including the root
    fn node_count(&self) -> usize;

    /// Get the parent of a node
    ///
    /// Returns `None` for the root node.
    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent()
    }

    /// Iterate over the current scope of a node, in fetch order
    fn children(&self, id: NodeId) -> Box<dyn Iterator<Item = NodeId> + '_> {
        match self.get(id) {
            Some(node) => Box::new(node.entities.values().copied()),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Look up a direct child by its raw (unescaped) name
    fn child(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.get(scope)?.entities.get(name).copied()
    }

    fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.name.as_str())
    }

    fn path(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.path.as_str())
    }

    fn is_expanded(&self, id: NodeId) -> bool {
        self.get(id).map(|n| n.expand).unwrap_or(false)
    }

    /// Find a node by its escaped dotted path, following each scope by name
    fn find_by_path(&self, path: &str) -> Option<NodeId> {
        path::split_path(path)
            .iter()
            .try_fold(self.root(), |scope, segment| self.child(scope, segment))
    }

    /// Like [`find_by_path`](Tree::find_by_path), but every scope passed
    /// through on the way must be expanded
    fn find_visible(&self, path: &str) -> Option<NodeId> {
        path::split_path(path)
            .iter()
            .try_fold(self.root(), |scope, segment| {
                if scope != self.root() && !self.is_expanded(scope) {
                    return None;
                }
                self.child(scope, segment)
            })
    }
}

/// Traversal order for walking the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalOrder {
    /// Visit parent before children (top-down)
    PreOrder,
    /// Visit children before parent (bottom-up)
    PostOrder,
}

/// Extension trait providing traversal utilities
///
/// Automatically implemented for all types that implement `Tree`.
pub trait TreeTraversal: Tree {
    /// Walk the tree from the root in the specified order
    fn walk(&self, order: TraversalOrder) -> TreeWalker<'_, Self>
    where
        Self: Sized,
    {
        TreeWalker::new(self, self.root(), order)
    }

    /// Walk the subtree below `start` (inclusive)
    fn walk_from(&self, start: NodeId, order: TraversalOrder) -> TreeWalker<'_, Self>
    where
        Self: Sized,
    {
        TreeWalker::new(self, start, order)
    }
}

impl<T: Tree> TreeTraversal for T {}

/// Iterator for traversing a tree in different orders
pub struct TreeWalker<'a, T: Tree + ?Sized> {
    tree: &'a T,
    order: TraversalOrder,
    pending: Vec<NodeId>,
    visited: HashSet<NodeId>,
}

impl<'a, T: Tree + ?Sized> TreeWalker<'a, T> {
    pub fn new(tree: &'a T, start: NodeId, order: TraversalOrder) -> Self {
        let pending = if tree.get(start).is_some() {
            vec![start]
        } else {
            Vec::new()
        };

        Self {
            tree,
            order,
            pending,
            visited: HashSet::new(),
        }
    }

    fn next_preorder(&mut self) -> Option<NodeId> {
        let current = self.pending.pop()?;

        // Push in reverse so children pop in scope order
        let children: Vec<_> = self.tree.children(current).collect();
        self.pending.extend(children.into_iter().rev());

        Some(current)
    }

    fn next_postorder(&mut self) -> Option<NodeId> {
        while let Some(&current) = self.pending.last() {
            if !self.visited.insert(current) {
                self.pending.pop();
                return Some(current);
            }

            let children: Vec<_> = self.tree.children(current).collect();
            self.pending.extend(children.into_iter().rev());
        }
        None
    }
}

impl<'a, T: Tree + ?Sized> Iterator for TreeWalker<'a, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        match self.order {
            TraversalOrder::PreOrder => self.next_preorder(),
            TraversalOrder::PostOrder => self.next_postorder(),
        }
    }
}
