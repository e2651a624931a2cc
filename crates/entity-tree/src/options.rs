//! Configuration options for the tree view and its queries.
//!
//! `TreeOptions` carries the pixel metrics used by the layout calculator and
//! the payload options sent with every scope query.

use serde::{Deserialize, Serialize};

use crate::dispatch::QueryOptions;

/// Configuration options for an entity tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Space above the first row.
    pub top_margin: f32,

    /// Height of a single row.
    pub item_height: f32,

    /// Horizontal offset of each nesting level.
    pub indent_width: f32,

    /// Default width of the tree panel.
    pub tree_width: f32,

    /// Extra space below the last row of the scroll region.
    pub bottom_padding: f32,

    /// How much shorter the guide line is than the subtree it spans.
    pub outline_inset: f32,

    /// Horizontal space reserved left of the selection box.
    pub select_box_inset: f32,

    /// Options sent with every scope query.
    pub query: QueryOptions,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            top_margin: 20.0,
            item_height: 26.0,
            indent_width: 12.0,
            tree_width: 215.0,
            bottom_padding: 100.0,
            outline_inset: 7.0,
            select_box_inset: 29.0,
            query: QueryOptions::tree(),
        }
    }
}

impl TreeOptions {
    /// Create new tree options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row height.
    pub fn item_height(mut self, item_height: f32) -> Self {
        self.item_height = item_height.max(0.0);
        self
    }

    /// Set the indentation per nesting level.
    pub fn indent_width(mut self, indent_width: f32) -> Self {
        self.indent_width = indent_width.max(0.0);
        self
    }

    /// Set the space above the first row.
    pub fn top_margin(mut self, top_margin: f32) -> Self {
        self.top_margin = top_margin;
        self
    }

    /// Set the default panel width.
    pub fn tree_width(mut self, tree_width: f32) -> Self {
        self.tree_width = tree_width.max(0.0);
        self
    }

    /// Set the padding below the last row.
    pub fn bottom_padding(mut self, bottom_padding: f32) -> Self {
        self.bottom_padding = bottom_padding.max(0.0);
        self
    }

    /// Set the query payload options.
    pub fn query(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TreeOptions::default();
        assert_eq!(options.top_margin, 20.0);
        assert_eq!(options.item_height, 26.0);
        assert_eq!(options.indent_width, 12.0);
        assert_eq!(options.tree_width, 215.0);
        assert_eq!(options.query, QueryOptions::tree());
    }

    #[test]
    fn test_builder_clamps_negative_sizes() {
        let options = TreeOptions::new().item_height(-4.0).indent_width(16.0);
        assert_eq!(options.item_height, 0.0);
        assert_eq!(options.indent_width, 16.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: TreeOptions =
            serde_json::from_str(r#"{ "item_height": 20.0, "query": { "values": true } }"#)
                .unwrap();
        assert_eq!(options.item_height, 20.0);
        assert_eq!(options.indent_width, 12.0);
        assert!(options.query.values);
        assert!(options.query.entity_labels);
        assert!(options.query.variable_labels);
        assert!(options.query.colors);
        assert!(options.query.is_set);
    }
}
