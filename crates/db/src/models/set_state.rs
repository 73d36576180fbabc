//! Set state rows and DTOs.

use canopy_core::state_type::StateTypeId;
use canopy_core::types::{DbId, Timestamp, Version};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `set_states` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SetState {
    pub id: DbId,
    pub uid: Uuid,
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub state_type: StateTypeId,
    pub version: Version,
    pub value: String,
    pub created_at: Timestamp,
    pub created_by: DbId,
    pub updated_at: Timestamp,
    pub updated_by: DbId,
}

/// DTO for inserting a set member.
#[derive(Debug, Clone)]
pub struct CreateSetState {
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub state_type: StateTypeId,
    pub version: Version,
    pub value: String,
    pub user_id: DbId,
}
