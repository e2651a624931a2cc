//! The local mirror of the server's entity tree
//!
//! Nodes are stored in an arena owned by [`EntityTree`]; the [`Tree`] trait
//! provides navigation by id and by escaped dotted path.

mod entity_tree;
mod node;
pub mod path;
pub mod sort;
mod traits;

pub use entity_tree::EntityTree;
pub use node::{NodeFlags, NodeId, TreeNode, ROOT_PATH, WILDCARD_PREFAB};
pub use traits::{TraversalOrder, Tree, TreeTraversal, TreeWalker};

/// Re-export common types for convenience
pub mod prelude {
    pub use super::{
        EntityTree, NodeFlags, NodeId, TraversalOrder, Tree, TreeNode, TreeTraversal,
    };
}
