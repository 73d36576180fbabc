//! Action rows and DTOs.

use canopy_core::action::{ActionConfig, ActionTypeId};
use canopy_core::types::{DbId, Timestamp, Version};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `actions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Action {
    pub id: DbId,
    pub uid: Uuid,
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub version: Version,
    pub resource_ref_id: DbId,
    pub name: String,
    pub action_type: ActionTypeId,
    pub trigger_mode: String,
    pub transformer: Json<Value>,
    pub template: Json<Value>,
    pub config: Json<ActionConfig>,
    pub created_at: Timestamp,
    pub created_by: DbId,
    pub updated_at: Timestamp,
    pub updated_by: DbId,
}

/// DTO for inserting an action.
#[derive(Debug, Clone)]
pub struct CreateAction {
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub version: Version,
    pub resource_ref_id: DbId,
    pub name: String,
    pub action_type: ActionTypeId,
    pub trigger_mode: String,
    pub transformer: Value,
    pub template: Value,
    pub config: ActionConfig,
    pub user_id: DbId,
}

/// DTO for updating an action. The id and owning app never change.
#[derive(Debug, Clone)]
pub struct UpdateAction {
    pub resource_ref_id: DbId,
    pub name: String,
    pub action_type: ActionTypeId,
    pub trigger_mode: String,
    pub transformer: Value,
    pub template: Value,
    pub config: ActionConfig,
    pub user_id: DbId,
}
