//! App snapshot rows.

use canopy_core::history::{AppModifyHistory, TriggerModeId};
use canopy_core::types::{DbId, Timestamp, Version};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `app_snapshots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
    pub id: DbId,
    pub uid: Uuid,
    pub team_id: DbId,
    pub app_ref_id: DbId,
    pub target_version: Version,
    pub trigger_mode: TriggerModeId,
    pub modify_history: Json<Vec<AppModifyHistory>>,
    pub created_at: Timestamp,
}
