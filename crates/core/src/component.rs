//! Component nodes exchanged with the editor.
//!
//! The server owns only the structural fields of a component: its display
//! name, its parent's display name, its type, and its children. Everything
//! else the editor sends (layout, props, styles) is kept verbatim in
//! [`ComponentNode::props`] and persisted as opaque content.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Display name of the summit node created with every new app.
pub const SUMMIT_DISPLAY_NAME: &str = "root";

/// Component type of the summit node.
pub const SUMMIT_COMPONENT_TYPE: &str = "DOT_PANEL";

const PARENT_NODE_KEY: &str = "parentNode";
const CHILDREN_NODE_KEY: &str = "childrenNode";

/// One node of the component tree, with its children inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub display_name: String,
    /// Display name of the parent. Empty for the summit.
    #[serde(
        default,
        deserialize_with = "null_as_empty_string",
        serialize_with = "empty_string_as_null"
    )]
    pub parent_node: String,
    #[serde(rename = "type", default)]
    pub component_type: String,
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub children_node: Vec<ComponentNode>,
    /// Client-owned fields, stored without interpretation.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl ComponentNode {
    /// Build a bare node with no props and no children.
    pub fn new(
        display_name: impl Into<String>,
        parent_node: impl Into<String>,
        component_type: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            parent_node: parent_node.into(),
            component_type: component_type.into(),
            children_node: Vec::new(),
            props: Map::new(),
        }
    }

    /// The summit every new app starts with.
    pub fn summit() -> Self {
        let mut node = Self::new(SUMMIT_DISPLAY_NAME, "", SUMMIT_COMPONENT_TYPE);
        node.props
            .insert("containerType".into(), Value::String("EDITOR_DOT_PANEL".into()));
        node
    }

    /// Returns `true` if this node declares no parent.
    pub fn is_summit(&self) -> bool {
        self.parent_node.is_empty()
    }

    /// Serialize the node for the `content` column.
    ///
    /// Parent and children are dropped; they live in the row's link columns.
    pub fn to_content(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove(PARENT_NODE_KEY);
            map.remove(CHILDREN_NODE_KEY);
        }
        serde_json::to_string(&value)
    }

    /// Parse a node back out of a `content` column.
    pub fn from_content(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children_node
            .iter()
            .map(ComponentNode::subtree_len)
            .sum::<usize>()
    }

    /// Display names in this subtree, depth-first, parents before children.
    pub fn subtree_display_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.subtree_len());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            names.push(node.display_name.clone());
            stack.extend(node.children_node.iter().rev());
        }
        names
    }
}

fn null_as_empty_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_vec<'de, D>(deserializer: D) -> Result<Vec<ComponentNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ComponentNode>>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_string_as_null<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_empty() {
        serializer.serialize_none()
    } else {
        serializer.serialize_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn button() -> ComponentNode {
        serde_json::from_value(json!({
            "displayName": "btn1",
            "parentNode": "root",
            "type": "BUTTON_WIDGET",
            "x": 4,
            "props": {"text": "Go"},
            "childrenNode": []
        }))
        .unwrap()
    }

    #[test]
    fn unknown_fields_are_kept_in_props() {
        let node = button();
        assert_eq!(node.display_name, "btn1");
        assert_eq!(node.parent_node, "root");
        assert_eq!(node.component_type, "BUTTON_WIDGET");
        assert_eq!(node.props["x"], json!(4));
        assert_eq!(node.props["props"]["text"], json!("Go"));
    }

    #[test]
    fn content_drops_structural_links() {
        let mut node = button();
        node.children_node.push(ComponentNode::new("inner", "btn1", "TEXT_WIDGET"));

        let content = node.to_content().unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert!(value.get("parentNode").is_none());
        assert!(value.get("childrenNode").is_none());
        assert_eq!(value["displayName"], json!("btn1"));
        assert_eq!(value["x"], json!(4));
    }

    #[test]
    fn content_parses_back_without_links() {
        let node = button();
        let parsed = ComponentNode::from_content(&node.to_content().unwrap()).unwrap();
        assert_eq!(parsed.display_name, "btn1");
        assert!(parsed.parent_node.is_empty());
        assert!(parsed.children_node.is_empty());
        assert_eq!(parsed.props, node.props);
    }

    #[test]
    fn null_parent_and_children_are_accepted() {
        let node: ComponentNode = serde_json::from_value(json!({
            "displayName": "root",
            "parentNode": null,
            "type": "DOT_PANEL",
            "childrenNode": null
        }))
        .unwrap();
        assert!(node.is_summit());
        assert!(node.children_node.is_empty());
    }

    #[test]
    fn summit_serializes_null_parent() {
        let value = serde_json::to_value(ComponentNode::summit()).unwrap();
        assert_eq!(value["parentNode"], Value::Null);
        assert_eq!(value["displayName"], json!(SUMMIT_DISPLAY_NAME));
    }

    #[test]
    fn subtree_names_are_parent_first() {
        let mut container = ComponentNode::new("container1", "root", "CONTAINER_WIDGET");
        let mut inner = ComponentNode::new("inner", "container1", "CONTAINER_WIDGET");
        inner.children_node.push(ComponentNode::new("leaf", "inner", "TEXT_WIDGET"));
        container.children_node.push(inner);
        container
            .children_node
            .push(ComponentNode::new("sibling", "container1", "TEXT_WIDGET"));

        assert_eq!(container.subtree_len(), 4);
        assert_eq!(
            container.subtree_display_names(),
            vec!["container1", "inner", "leaf", "sibling"]
        );
    }
}
