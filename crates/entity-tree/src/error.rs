use derive_more::Display;

use crate::tree::NodeId;

/// Misuse of the tree or controller API
///
/// Dispatcher failures and unresolvable selection paths are expected
/// conditions and are not reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum TreeError {
    /// The node id does not refer to a live node
    #[display(fmt = "unknown node {:?}", _0)]
    UnknownNode(NodeId),
    /// A selection path with no segments
    #[display(fmt = "selection path is empty")]
    EmptyPath,
}

impl std::error::Error for TreeError {}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
