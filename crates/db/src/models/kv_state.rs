//! Key-value state rows and DTOs.

use canopy_core::state_type::StateTypeId;
use canopy_core::types::{DbId, Timestamp, Version};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `kv_states` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KvState {
    pub id: DbId,
    pub uid: Uuid,
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub state_type: StateTypeId,
    pub version: Version,
    pub key: String,
    pub value: String,
    pub created_at: Timestamp,
    pub created_by: DbId,
    pub updated_at: Timestamp,
    pub updated_by: DbId,
}

/// DTO for inserting or upserting a key-value row.
#[derive(Debug, Clone)]
pub struct CreateKvState {
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub state_type: StateTypeId,
    pub version: Version,
    pub key: String,
    pub value: String,
    pub user_id: DbId,
}
