//! Display order of sibling nodes

use std::cmp::Ordering;

use crate::tree::{NodeId, Tree, TreeNode};

/// Compare two siblings for display
///
/// Modules come first, then prefabs, then nodes with children, then
/// components. Within a tier nodes are ordered alphabetically by label, or
/// by name when either label is missing. Sibling names are unique, so the
/// order is total.
pub fn compare_siblings(a: &TreeNode, b: &TreeNode) -> Ordering {
    // `true` sorts first in every tier
    b.is_module
        .cmp(&a.is_module)
        .then_with(|| b.is_prefab.cmp(&a.is_prefab))
        .then_with(|| b.has_children.cmp(&a.has_children))
        .then_with(|| b.is_component.cmp(&a.is_component))
        .then_with(|| match (a.label(), b.label()) {
            (Some(la), Some(lb)) => collate(la, lb),
            _ => collate(&a.name, &b.name),
        })
        .then_with(|| a.name.cmp(&b.name))
}

/// Alphabetical comparison in the style of a default locale collation
///
/// Letters compare case-insensitively first; on a tie lowercase sorts before
/// uppercase, and the raw strings break any remaining tie.
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    folded(a)
        .cmp(&folded(b))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// Children of `scope` in display order
///
/// Returns an empty list for dropped or unfetched scopes.
pub fn sorted_children<T: Tree>(tree: &T, scope: NodeId) -> Vec<NodeId> {
    let mut children: Vec<(NodeId, &TreeNode)> = tree
        .children(scope)
        .filter_map(|id| tree.get(id).map(|node| (id, node)))
        .collect();
    children.sort_by(|(_, a), (_, b)| compare_siblings(a, b));
    children.into_iter().map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(name: &str) -> TreeNode {
        TreeNode::new(name, name)
    }

    fn sort_names(mut nodes: Vec<TreeNode>) -> Vec<String> {
        nodes.sort_by(compare_siblings);
        nodes.into_iter().map(|n| n.name).collect()
    }

    #[test]
    fn test_tiers_before_alphabet() {
        let mut z = node("Z");
        z.is_module = true;
        let mut a = node("a");
        a.has_children = true;
        let b = node("B");

        assert_eq!(sort_names(vec![b, a, z]), vec!["Z", "a", "B"]);
    }

    #[test]
    fn test_full_tier_precedence() {
        let mut module = node("m");
        module.is_module = true;
        let mut prefab = node("p");
        prefab.is_prefab = true;
        let mut parent = node("c");
        parent.has_children = true;
        let mut component = node("b");
        component.is_component = true;
        let plain = node("a");

        assert_eq!(
            sort_names(vec![plain, component, parent, prefab, module]),
            vec!["m", "p", "c", "b", "a"]
        );
    }

    #[test]
    fn test_labels_override_names() {
        let mut first = node("zeta");
        first.label = "Alpha".to_string();
        let mut second = node("alpha");
        second.label = "Beta".to_string();

        assert_eq!(sort_names(vec![second, first]), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_missing_label_falls_back_to_names() {
        let mut labelled = node("b");
        labelled.label = "A".to_string();
        let unlabelled = node("a");

        assert_eq!(sort_names(vec![labelled, unlabelled]), vec!["a", "b"]);
    }

    #[test]
    fn test_collate() {
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("a", "A"), Ordering::Less);
        assert_eq!(collate("Item2", "item10"), Ordering::Greater);
        assert_eq!(collate("same", "same"), Ordering::Equal);
    }
}
