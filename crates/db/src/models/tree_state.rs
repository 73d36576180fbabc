//! Tree-state rows and DTOs.

use canopy_core::state_type::StateTypeId;
use canopy_core::tree::FlatTreeNode;
use canopy_core::types::{DbId, Timestamp, Version};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `tree_states` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TreeState {
    pub id: DbId,
    pub uid: Uuid,
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub state_type: StateTypeId,
    pub version: Version,
    pub parent_node_ref_id: DbId,
    pub children_node_ref_ids: Json<Vec<DbId>>,
    pub name: String,
    pub content: String,
    pub created_at: Timestamp,
    pub created_by: DbId,
    pub updated_at: Timestamp,
    pub updated_by: DbId,
}

impl FlatTreeNode for TreeState {
    fn node_id(&self) -> DbId {
        self.id
    }

    fn parent_id(&self) -> DbId {
        self.parent_node_ref_id
    }

    fn children_ids(&self) -> &[DbId] {
        &self.children_node_ref_ids.0
    }

    fn node_name(&self) -> &str {
        &self.name
    }

    fn content(&self) -> &str {
        &self.content
    }
}

/// DTO for inserting a tree node.
#[derive(Debug, Clone)]
pub struct CreateTreeState {
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub state_type: StateTypeId,
    pub version: Version,
    pub parent_node_ref_id: DbId,
    pub children_node_ref_ids: Vec<DbId>,
    pub name: String,
    pub content: String,
    pub user_id: DbId,
}
