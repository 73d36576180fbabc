#![allow(dead_code)]

use canopy_core::component::ComponentNode;
use canopy_core::types::DbId;
use canopy_db::models::app::App;
use canopy_state::{EditContext, StateServices};
use sqlx::PgPool;

pub const TEAM_ID: DbId = 1;
pub const USER_ID: DbId = 7;

/// Create an app (with its summit and edit snapshot) and an edit context
/// for it.
pub async fn new_app(pool: &PgPool, name: &str) -> (StateServices, App, EditContext) {
    let services = StateServices::new(pool.clone());
    let app = services
        .apps
        .create_app(TEAM_ID, name, None, USER_ID)
        .await
        .unwrap();
    let ctx = EditContext::new(TEAM_ID, app.id, USER_ID);
    (services, app, ctx)
}

pub fn widget(name: &str, parent: &str) -> ComponentNode {
    let mut node = ComponentNode::new(name, parent, "BUTTON_WIDGET");
    node.props.insert("x".into(), serde_json::json!(name.len()));
    node
}

pub fn container(name: &str, parent: &str, children: Vec<ComponentNode>) -> ComponentNode {
    let mut node = ComponentNode::new(name, parent, "CONTAINER_WIDGET");
    node.children_node = children;
    node
}

/// A chain of `depth` nested containers `level1 > level2 > ...` under root.
pub fn chain(depth: usize) -> ComponentNode {
    let parent_of = |level: usize| {
        if level == 1 {
            "root".to_string()
        } else {
            format!("level{}", level - 1)
        }
    };
    let mut node = container(&format!("level{depth}"), &parent_of(depth), Vec::new());
    for level in (1..depth).rev() {
        node = container(&format!("level{level}"), &parent_of(level), vec![node]);
    }
    node
}

/// Display names of a node's direct children.
pub fn child_names(node: &ComponentNode) -> Vec<&str> {
    node.children_node
        .iter()
        .map(|c| c.display_name.as_str())
        .collect()
}
