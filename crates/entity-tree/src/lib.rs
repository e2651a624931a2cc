//! Entity Tree Library
//!
//! Keeps a local mirror of a server-held entity hierarchy in sync, fetching
//! one scope (the direct children of a path) at a time.
//!
//! # Core Concepts
//!
//! - **EntityTree**: Arena of [`TreeNode`]s; node identity survives refreshes
//! - **Scope reconciliation**: Merging a fetch result into an existing scope
//! - **QueryDispatcher**: The transport boundary issuing keyed, abortable queries
//! - **TreeController**: Toggle, select-by-path and collapse on top of the above
//! - **Layout**: Row geometry for a renderer
//!
//! # Example
//!
//! ```no_run
//! use entity_tree::prelude::*;
//!
//! let world = MemoryWorld::new().with_entity(WorldEntity::new("player"));
//! let mut controller = TreeController::new(MemoryDispatcher::new(world), TreeOptions::default());
//!
//! controller.open().expect("root is always live");
//! controller.poll_replies();
//!
//! for row in visible_rows(controller.tree(), controller.options()) {
//!     let node = controller.tree().get(row.node).unwrap();
//!     println!("{:indent$}{}", "", node.display_label(), indent = row.depth * 2);
//! }
//! ```

pub mod controller;
pub mod dispatch;
mod error;
pub mod layout;
pub mod options;
pub mod scope;
pub mod tree;

pub use controller::{PanelState, ScopeState, TreeController, TreeEvent};
pub use error::{Result, TreeError};
pub use options::TreeOptions;
pub use tree::{EntityTree, NodeId, TreeNode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::controller::{PanelState, ScopeState, TreeController, TreeEvent};
    pub use crate::dispatch::{
        MemoryDispatcher, MemoryWorld, QueryDispatcher, QueryOptions, Responder, ScopeQuery,
        WorldEntity,
    };
    pub use crate::layout::{visible_rows, TreeRow};
    pub use crate::options::TreeOptions;
    pub use crate::scope::{ScopeBatch, ScopeFetchResult};
    pub use crate::tree::prelude::*;
    pub use crate::TreeError;
}
