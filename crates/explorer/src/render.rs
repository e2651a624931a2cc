use entity_tree::dispatch::QueryDispatcher;
use entity_tree::layout::visible_rows;
use entity_tree::tree::Tree;
use entity_tree::TreeController;

/// Render the visible rows of the tree as an indented outline
///
/// Expanded scopes are marked `▾`, collapsed scopes with children `▸`.
/// The selected row ends with ` *`.
pub fn render_outline<D: QueryDispatcher>(controller: &TreeController<D>) -> String {
    let tree = controller.tree();
    let selected = controller.selected_node();
    let mut out = String::new();

    for row in visible_rows(tree, controller.options()) {
        let Some(node) = tree.get(row.node) else {
            continue;
        };

        let marker = if node.expand {
            '▾'
        } else if node.has_children {
            '▸'
        } else {
            '·'
        };

        out.push_str(&"  ".repeat(row.depth));
        out.push(marker);
        out.push(' ');
        out.push_str(&node.display_label());
        if node.is_disabled {
            out.push_str(" (disabled)");
        }
        if selected == Some(row.node) {
            out.push_str(" *");
        }
        out.push('\n');
    }

    out
}
