//! Core node types for the entity tree

use indexmap::IndexMap;

use crate::tree::path;

slotmap::new_key_type! {
    /// Unique identifier for a node within an [`EntityTree`](crate::tree::EntityTree)
    ///
    /// Identifiers are generational: once a node is dropped from its scope the
    /// identifier never resolves again, even if the same name reappears later.
    pub struct NodeId;
}

/// Path of the synthetic root node
pub const ROOT_PATH: &str = "0";

/// Prefab value meaning "not instantiated from a prefab"
pub const WILDCARD_PREFAB: &str = "*";

/// Flags reported by the server for each child of a scope
///
/// Decoded from the query's `is_set` vector: bit 1 is the module term, bit 2
/// the component term, bit 3 prefab, bit 4 disabled and bit 5 the
/// "has children" term. Bit 0 is the scope term itself and is always set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags {
    pub is_module: bool,
    pub is_component: bool,
    pub is_prefab: bool,
    pub is_disabled: bool,
    pub has_children: bool,
}

impl NodeFlags {
    pub const MODULE_BIT: usize = 1;
    pub const COMPONENT_BIT: usize = 2;
    pub const PREFAB_BIT: usize = 3;
    pub const DISABLED_BIT: usize = 4;
    pub const CHILDREN_BIT: usize = 5;

    /// Decode an `is_set` vector; missing bits read as false
    pub fn from_is_set(is_set: &[bool]) -> Self {
        let bit = |index: usize| is_set.get(index).copied().unwrap_or(false);
        Self {
            is_module: bit(Self::MODULE_BIT),
            is_component: bit(Self::COMPONENT_BIT),
            is_prefab: bit(Self::PREFAB_BIT),
            is_disabled: bit(Self::DISABLED_BIT),
            has_children: bit(Self::CHILDREN_BIT),
        }
    }

    /// Encode back into the six-entry `is_set` layout
    pub fn to_is_set(self) -> [bool; 6] {
        let mut is_set = [false; 6];
        is_set[0] = true;
        is_set[Self::MODULE_BIT] = self.is_module;
        is_set[Self::COMPONENT_BIT] = self.is_component;
        is_set[Self::PREFAB_BIT] = self.is_prefab;
        is_set[Self::DISABLED_BIT] = self.is_disabled;
        is_set[Self::CHILDREN_BIT] = self.has_children;
        is_set
    }
}

/// A single entity in the mirrored tree
///
/// Nodes are mutated in place whenever their scope is refetched, so any UI
/// state keyed on the node's [`NodeId`] survives refreshes.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// The entity's name within its parent scope (unescaped)
    pub name: String,
    /// Full escaped path, e.g. `world.foo\.bar`
    pub path: String,
    /// Human readable label; empty when the server sent none
    pub label: String,
    /// Prefab the entity instantiates, or [`WILDCARD_PREFAB`]
    pub prefab: String,
    pub color: Option<String>,
    /// Result type reported by the batch that created this node
    pub query_type: String,
    pub is_module: bool,
    pub is_component: bool,
    pub is_prefab: bool,
    pub is_disabled: bool,
    pub has_children: bool,
    /// Whether the node's scope is expanded in the view
    pub expand: bool,
    /// Child scope, keyed by raw name, in the order of the latest fetch
    pub entities: IndexMap<String, NodeId>,
    pub(crate) parent: Option<NodeId>,
    /// Set once a fetch of this scope has been merged; reset on collapse-all
    pub(crate) fetched: bool,
    /// Bumped whenever the scope's in-flight query is aborted
    pub(crate) generation: u64,
}

impl TreeNode {
    /// Create a fresh, collapsed node that has never been fetched
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            label: String::new(),
            prefab: WILDCARD_PREFAB.to_string(),
            color: None,
            query_type: String::new(),
            is_module: false,
            is_component: false,
            is_prefab: false,
            is_disabled: false,
            has_children: false,
            expand: false,
            entities: IndexMap::new(),
            parent: None,
            fetched: false,
            generation: 0,
        }
    }

    /// The synthetic root node
    pub fn root() -> Self {
        let mut root = Self::new(ROOT_PATH, ROOT_PATH);
        root.expand = true;
        root.has_children = true;
        root
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether a fetch of this scope has completed since it was last cleared
    pub fn is_fetched(&self) -> bool {
        self.fetched
    }

    pub fn flags(&self) -> NodeFlags {
        NodeFlags {
            is_module: self.is_module,
            is_component: self.is_component,
            is_prefab: self.is_prefab,
            is_disabled: self.is_disabled,
            has_children: self.has_children,
        }
    }

    pub fn set_flags(&mut self, flags: NodeFlags) {
        self.is_module = flags.is_module;
        self.is_component = flags.is_component;
        self.is_prefab = flags.is_prefab;
        self.is_disabled = flags.is_disabled;
        self.has_children = flags.has_children;
    }

    /// The label, or `None` when the server did not provide one
    pub fn label(&self) -> Option<&str> {
        (!self.label.is_empty()).then_some(self.label.as_str())
    }

    /// Whether the entity is an instance of some prefab
    pub fn has_prefab(&self) -> bool {
        self.prefab != WILDCARD_PREFAB
    }

    /// Text shown for the node's row
    ///
    /// Prefab instances get the prefab's own name appended, e.g. `turret : Gun`.
    pub fn display_label(&self) -> String {
        let label = self.label().unwrap_or(&self.name);
        if self.has_prefab() {
            format!("{} : {}", label, path::last_segment(&self.prefab))
        } else {
            label.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_is_set() {
        let flags = NodeFlags::from_is_set(&[true, true, false, true, false, true]);
        assert!(flags.is_module);
        assert!(!flags.is_component);
        assert!(flags.is_prefab);
        assert!(!flags.is_disabled);
        assert!(flags.has_children);
        assert_eq!(
            flags.to_is_set(),
            [true, true, false, true, false, true]
        );
    }

    #[test]
    fn test_short_is_set_reads_false() {
        let flags = NodeFlags::from_is_set(&[true, true]);
        assert!(flags.is_module);
        assert!(!flags.has_children);
        assert_eq!(NodeFlags::from_is_set(&[]), NodeFlags::default());
    }

    #[test]
    fn test_display_label() {
        let mut node = TreeNode::new("turret", "world.turret");
        assert_eq!(node.display_label(), "turret");

        node.label = "Turret".to_string();
        assert_eq!(node.display_label(), "Turret");

        node.prefab = "assets.weapons.Gun".to_string();
        assert_eq!(node.display_label(), "Turret : Gun");
    }

    #[test]
    fn test_root() {
        let root = TreeNode::root();
        assert_eq!(root.path, ROOT_PATH);
        assert!(root.expand);
        assert!(root.entities.is_empty());
        assert!(!root.is_fetched());
    }
}
