use crate::tree::TreeNode;
use crate::Result;
use indexmap::IndexMap;

/// Single-level view of a tree: joined key path → leaf or list value.
pub type FlatRecord = IndexMap<String, TreeNode>;

/// Projects a nested [`TreeNode`] onto one level for tabular output.
///
/// Nested maps contribute their keys joined to the parent path with the
/// separator. Leaves and lists are emitted as they are; a list stays a single
/// value rather than spreading across columns or rows.
#[derive(Debug, Clone)]
pub struct Flattener {
    separator: String,
}

impl Flattener {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Flatten `tree`, visiting keys in the order the maps hold them.
    ///
    /// ```
    /// use xfaconvert::{Flattener, TreeBuilder, TreeNode};
    ///
    /// let tree = TreeBuilder::parse("<root><data>value</data></root>").unwrap();
    /// let record = Flattener::default().flatten(&tree);
    /// assert_eq!(record.get("root_data"), Some(&TreeNode::leaf("value")));
    /// ```
    pub fn flatten(&self, tree: &TreeNode) -> FlatRecord {
        let mut record = FlatRecord::new();
        if let TreeNode::Map(map) = tree {
            self.flatten_into(map, "", &mut record);
        }
        record
    }

    fn flatten_into(&self, map: &IndexMap<String, TreeNode>, parent: &str, out: &mut FlatRecord) {
        for (key, value) in map {
            let path = if parent.is_empty() {
                key.clone()
            } else {
                format!("{parent}{}{key}", self.separator)
            };

            match value {
                TreeNode::Map(inner) => self.flatten_into(inner, &path, out),
                other => {
                    out.insert(path, other.clone());
                }
            }
        }
    }
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new("_")
    }
}

/// Render a flattened value as one CSV cell: text as-is, null as an empty
/// cell, anything structured as compact JSON.
pub(crate) fn cell_text(value: &TreeNode) -> Result<String> {
    Ok(match value {
        TreeNode::Leaf(Some(text)) => text.clone(),
        TreeNode::Leaf(None) => String::new(),
        structured => serde_json::to_string(structured)?,
    })
}
