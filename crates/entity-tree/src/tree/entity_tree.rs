//! Arena storage for the mirrored entity tree

use indexmap::IndexMap;
use slotmap::SlotMap;

use crate::error::{Result, TreeError};
use crate::tree::{NodeId, Tree, TreeNode};

/// The local mirror of the server's entity tree
///
/// Nodes live in a generational arena. A node keeps its [`NodeId`] for as
/// long as it stays in its parent's scope; dropping a node frees its whole
/// subtree, after which the old ids no longer resolve.
///
/// # Example
///
/// ```ignore
/// let mut tree = EntityTree::new();
/// let root = tree.root();
/// assert_eq!(tree.node(root)?.path, "0");
/// ```
#[derive(Debug, Clone)]
pub struct EntityTree {
    nodes: SlotMap<NodeId, TreeNode>,
    root: NodeId,
}

impl Default for EntityTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTree {
    /// Create a tree holding only the synthetic root
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(TreeNode::root());
        Self { nodes, root }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&TreeNode> {
        self.nodes.get(id).ok_or(TreeError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut TreeNode> {
        self.nodes.get_mut(id).ok_or(TreeError::UnknownNode(id))
    }

    /// Add `node` to the arena as a child of `scope`
    ///
    /// The node is registered in the scope's map under its name.
    #[cfg(test)]
    pub(crate) fn insert_child(&mut self, scope: NodeId, mut node: TreeNode) -> NodeId {
        node.parent = Some(scope);
        let name = node.name.clone();
        let id = self.nodes.insert(node);
        if let Some(parent) = self.nodes.get_mut(scope) {
            parent.entities.insert(name, id);
        }
        id
    }

    /// Add `node` to the arena as a child of `scope` without touching the
    /// scope's map
    pub(crate) fn allocate(&mut self, scope: NodeId, mut node: TreeNode) -> NodeId {
        node.parent = Some(scope);
        self.nodes.insert(node)
    }

    /// Free a node and everything below it
    ///
    /// The node is not unlinked from its parent's scope map. Returns the
    /// number of freed nodes.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) -> usize {
        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.entities.into_values());
                freed += 1;
            }
        }
        freed
    }

    /// Drop every child of `scope`, leaving its map empty
    pub(crate) fn clear_scope(&mut self, scope: NodeId) -> usize {
        let children = match self.nodes.get_mut(scope) {
            Some(node) => std::mem::take(&mut node.entities),
            None => return 0,
        };
        children
            .into_values()
            .map(|child| self.remove_subtree(child))
            .sum()
    }

    /// Swap in a new scope map, returning the previous one
    pub(crate) fn replace_scope(
        &mut self,
        scope: NodeId,
        entities: IndexMap<String, NodeId>,
    ) -> Result<IndexMap<String, NodeId>> {
        let node = self.node_mut(scope)?;
        Ok(std::mem::replace(&mut node.entities, entities))
    }

    /// Iterate over all live nodes in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter()
    }
}

impl Tree for EntityTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tree_has_root() {
        let tree = EntityTree::new();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.node(tree.root()).unwrap().path, "0");
        assert_eq!(tree.parent(tree.root()), None);
    }

    #[test]
    fn test_insert_child_links_scope() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let child = tree.insert_child(root, TreeNode::new("a", "a"));

        assert_eq!(tree.child(root, "a"), Some(child));
        assert_eq!(tree.parent(child), Some(root));
    }

    #[test]
    fn test_remove_subtree_frees_descendants() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, TreeNode::new("a", "a"));
        let b = tree.insert_child(a, TreeNode::new("b", "a.b"));
        let _c = tree.insert_child(b, TreeNode::new("c", "a.b.c"));

        assert_eq!(tree.remove_subtree(a), 3);
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_stale_id_does_not_resolve() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let a = tree.insert_child(root, TreeNode::new("a", "a"));
        tree.clear_scope(root);

        let again = tree.insert_child(root, TreeNode::new("a", "a"));
        assert_ne!(a, again);
        assert_eq!(tree.node(a).unwrap_err(), TreeError::UnknownNode(a));
    }
}
