//! Scope fetch results and their reconciliation into the tree
//!
//! A scope fetch returns the direct children of one path, grouped into
//! batches that share a flag vector and prefab binding. [`reconcile`] merges
//! such a result into the existing scope: nodes whose name reappears keep
//! their [`NodeId`] and are updated in place, new names get fresh nodes, and
//! names missing from the result are dropped together with their subtrees.

use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tree::{path, EntityTree, NodeFlags, NodeId, TreeNode, WILDCARD_PREFAB};

/// Reply payload of a scope query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeFetchResult {
    #[serde(default)]
    pub results: Vec<ScopeBatch>,
}

/// One group of children sharing the same flags and prefab binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeBatch {
    /// Escaped path of the scope these children belong to
    #[serde(default)]
    pub parent: Option<String>,
    /// Raw child names
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_labels: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Option<String>>>,
    /// Variable bindings; index 0 is the prefab, `"*"` when unbound
    #[serde(default)]
    pub vars: Vec<String>,
    /// Term flags, see [`NodeFlags`]
    #[serde(default)]
    pub is_set: Vec<bool>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ScopeFetchResult {
    pub fn new(results: Vec<ScopeBatch>) -> Self {
        Self { results }
    }

    /// Total number of children across all batches
    pub fn entity_count(&self) -> usize {
        self.results.iter().map(|batch| batch.entities.len()).sum()
    }
}

impl ScopeBatch {
    /// A batch of children of `parent` that all share `flags`
    pub fn new<I, S>(parent: Option<&str>, entities: I, flags: NodeFlags) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parent: parent.map(str::to_string),
            entities: entities.into_iter().map(Into::into).collect(),
            entity_labels: None,
            colors: None,
            vars: vec![WILDCARD_PREFAB.to_string()],
            is_set: flags.to_is_set().to_vec(),
            kind: String::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.entity_labels = Some(labels.into_iter().map(|l| l.map(Into::into)).collect());
        self
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.colors = Some(colors.into_iter().map(|c| c.map(Into::into)).collect());
        self
    }

    pub fn with_prefab(mut self, prefab: impl Into<String>) -> Self {
        match self.vars.first_mut() {
            Some(var) => *var = prefab.into(),
            None => self.vars.push(prefab.into()),
        }
        self
    }

    pub fn flags(&self) -> NodeFlags {
        NodeFlags::from_is_set(&self.is_set)
    }

    /// Prefab binding of this batch, defaulting to the wildcard
    pub fn prefab(&self) -> &str {
        self.vars.first().map(String::as_str).unwrap_or(WILDCARD_PREFAB)
    }

    /// Label of the child at `index`, if the server sent a non-empty one
    pub fn label(&self, index: usize) -> Option<&str> {
        self.entity_labels
            .as_ref()?
            .get(index)?
            .as_deref()
            .filter(|label| !label.is_empty())
    }

    /// Color of the child at `index`, if the server sent a non-empty one
    pub fn color(&self, index: usize) -> Option<&str> {
        self.colors
            .as_ref()?
            .get(index)?
            .as_deref()
            .filter(|color| !color.is_empty())
    }

    /// Canonical path of the child at `index`
    pub fn child_path(&self, index: usize) -> Option<String> {
        let name = self.entities.get(index)?;
        Some(path::child_path(self.parent.as_deref(), name))
    }
}

/// Summary of one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Children seen for the first time
    pub created: usize,
    /// Children that kept their identity
    pub retained: usize,
    /// Nodes freed, including the subtrees of dropped children
    pub dropped: usize,
    /// The selected node was part of this scope and is gone now
    pub selection_lost: bool,
}

/// Merge a fetch result into the scope of `scope`
///
/// The scope's map is replaced wholesale by a map built from `result`.
/// `selected` is the current selection path, used to report whether the
/// selected node disappeared with this refresh.
pub fn reconcile(
    tree: &mut EntityTree,
    scope: NodeId,
    result: &ScopeFetchResult,
    selected: Option<&str>,
) -> Result<ReconcileOutcome> {
    let mut previous = tree.replace_scope(scope, IndexMap::new())?;
    let mut fresh: IndexMap<String, NodeId> = IndexMap::with_capacity(result.entity_count());
    let mut outcome = ReconcileOutcome::default();

    for batch in &result.results {
        let flags = batch.flags();
        let prefab = batch.prefab();

        for (index, name) in batch.entities.iter().enumerate() {
            let id = match previous
                .shift_remove(name)
                .or_else(|| fresh.get(name).copied())
            {
                Some(id) => {
                    outcome.retained += 1;
                    id
                }
                None => {
                    outcome.created += 1;
                    let child_path = path::child_path(batch.parent.as_deref(), name);
                    let mut node = TreeNode::new(name.clone(), child_path);
                    node.query_type = batch.kind.clone();
                    tree.allocate(scope, node)
                }
            };

            let node = tree.node_mut(id)?;
            node.label = batch.label(index).unwrap_or(name.as_str()).to_string();
            node.color = batch.color(index).map(str::to_string);
            node.prefab = prefab.to_string();
            node.set_flags(flags);

            fresh.insert(name.clone(), id);
        }
    }

    for (_, stale) in previous {
        let stale_path = tree.node(stale)?.path.clone();
        if let Some(selected) = selected {
            if is_same_or_below(selected, &stale_path) {
                outcome.selection_lost = true;
            }
        }
        outcome.dropped += tree.remove_subtree(stale);
    }

    let node = tree.node_mut(scope)?;
    node.entities = fresh;
    node.fetched = true;

    trace!(
        "reconciled scope {}: {} created, {} retained, {} dropped",
        node.path,
        outcome.created,
        outcome.retained,
        outcome.dropped
    );

    Ok(outcome)
}

fn is_same_or_below(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use pretty_assertions::assert_eq;

    fn entities(names: &[&str]) -> ScopeFetchResult {
        ScopeFetchResult::new(vec![ScopeBatch::new(
            None,
            names.iter().copied(),
            NodeFlags::default(),
        )])
    }

    #[test]
    fn test_reconcile_creates_nodes() {
        let mut tree = EntityTree::new();
        let root = tree.root();

        let outcome = reconcile(&mut tree, root, &entities(&["a", "b"]), None).unwrap();
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.retained, 0);

        let a = tree.child(root, "a").unwrap();
        let node = tree.node(a).unwrap();
        assert_eq!(node.path, "a");
        assert_eq!(node.label, "a");
        assert_eq!(node.prefab, "*");
        assert!(!node.expand);
        assert_eq!(tree.parent(a), Some(root));
        assert!(tree.node(root).unwrap().is_fetched());
    }

    #[test]
    fn test_reconcile_preserves_identity() {
        let mut tree = EntityTree::new();
        let root = tree.root();

        reconcile(&mut tree, root, &entities(&["a", "b"]), None).unwrap();
        let a = tree.child(root, "a").unwrap();
        tree.node_mut(a).unwrap().expand = true;

        let outcome = reconcile(&mut tree, root, &entities(&["b", "a"]), None).unwrap();
        assert_eq!(outcome.retained, 2);
        assert_eq!(tree.child(root, "a"), Some(a));
        assert!(tree.node(a).unwrap().expand);

        let order: Vec<_> = tree.node(root).unwrap().entities.keys().cloned().collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_reconcile_overwrites_fields_in_place() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        reconcile(&mut tree, root, &entities(&["tank"]), None).unwrap();
        let tank = tree.child(root, "tank").unwrap();

        let flags = NodeFlags {
            is_prefab: true,
            has_children: true,
            ..NodeFlags::default()
        };
        let batch = ScopeBatch::new(None, ["tank"], flags)
            .with_labels([Some("Tank")])
            .with_colors([Some("#ff0000")])
            .with_prefab("assets.Vehicle");
        reconcile(&mut tree, root, &ScopeFetchResult::new(vec![batch]), None).unwrap();

        let node = tree.node(tank).unwrap();
        assert_eq!(node.label, "Tank");
        assert_eq!(node.color.as_deref(), Some("#ff0000"));
        assert_eq!(node.prefab, "assets.Vehicle");
        assert!(node.is_prefab);
        assert!(node.has_children);
    }

    #[test]
    fn test_reconcile_drops_missing_names_and_subtrees() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        reconcile(&mut tree, root, &entities(&["a", "b"]), None).unwrap();
        let a = tree.child(root, "a").unwrap();
        let a_children = ScopeFetchResult::new(vec![ScopeBatch::new(
            Some("a"),
            ["x", "y"],
            NodeFlags::default(),
        )]);
        reconcile(&mut tree, a, &a_children, None).unwrap();
        assert_eq!(tree.node_count(), 5);

        let outcome = reconcile(&mut tree, root, &entities(&["b"]), None).unwrap();
        assert_eq!(outcome.dropped, 3);
        assert!(!tree.contains(a));
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_reconcile_reports_lost_selection() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        reconcile(&mut tree, root, &entities(&["a", "b"]), Some("a")).unwrap();

        let kept = reconcile(&mut tree, root, &entities(&["a"]), Some("a")).unwrap();
        assert!(!kept.selection_lost);

        let lost = reconcile(&mut tree, root, &entities(&["b"]), Some("a")).unwrap();
        assert!(lost.selection_lost);
    }

    #[test]
    fn test_reconcile_escapes_dotted_names() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        reconcile(&mut tree, root, &entities(&["foo.bar"]), None).unwrap();

        let id = tree.child(root, "foo.bar").unwrap();
        assert_eq!(tree.node(id).unwrap().path, "foo\\.bar");
        assert_eq!(path::split_path("foo\\.bar"), vec!["foo.bar"]);
        assert_eq!(tree.find_by_path("foo\\.bar"), Some(id));
    }

    #[test]
    fn test_reconcile_multiple_batches() {
        let mut tree = EntityTree::new();
        let root = tree.root();
        let modules = NodeFlags {
            is_module: true,
            ..NodeFlags::default()
        };
        let result = ScopeFetchResult::new(vec![
            ScopeBatch::new(None, ["core"], modules),
            ScopeBatch::new(None, ["player"], NodeFlags::default()),
        ]);

        reconcile(&mut tree, root, &result, None).unwrap();
        let core = tree.child(root, "core").unwrap();
        let player = tree.child(root, "player").unwrap();
        assert!(tree.node(core).unwrap().is_module);
        assert!(!tree.node(player).unwrap().is_module);
    }

    #[test]
    fn test_empty_labels_and_colors_default() {
        let batch = ScopeBatch::new(None, ["a"], NodeFlags::default())
            .with_labels([Some("")])
            .with_colors([None::<String>]);
        assert_eq!(batch.label(0), None);
        assert_eq!(batch.color(0), None);
        assert_eq!(batch.label(5), None);
    }

    #[test]
    fn test_deserialize_wire_format() {
        let json = r##"{
            "results": [{
                "parent": "world",
                "entities": ["tank", "v1.0"],
                "entity_labels": ["Tank", null],
                "colors": ["#00ff00", null],
                "vars": ["*"],
                "is_set": [true, false, false, false, false, true],
                "type": "entities"
            }]
        }"##;
        let result: ScopeFetchResult = serde_json::from_str(json).unwrap();
        let batch = &result.results[0];

        assert_eq!(result.entity_count(), 2);
        assert_eq!(batch.kind, "entities");
        assert_eq!(batch.label(0), Some("Tank"));
        assert_eq!(batch.label(1), None);
        assert!(batch.flags().has_children);
        assert_eq!(batch.child_path(1).as_deref(), Some("world.v1\\.0"));
    }
}
