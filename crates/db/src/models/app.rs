//! App rows and DTOs.

use canopy_core::app_config::{AppConfig, EditedBy};
use canopy_core::types::{DbId, Timestamp, Version};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `apps` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(rename = "appId")]
    pub id: DbId,
    pub uid: Uuid,
    pub team_id: DbId,
    #[serde(rename = "appName")]
    pub name: String,
    pub release_version: Version,
    pub mainline_version: Version,
    pub config: Json<AppConfig>,
    pub edited_by: Json<Vec<EditedBy>>,
    pub created_at: Timestamp,
    pub created_by: DbId,
    pub updated_at: Timestamp,
    pub updated_by: DbId,
}

impl App {
    pub fn is_public(&self) -> bool {
        self.config.0.public
    }
}

/// DTO for creating an app.
#[derive(Debug, Clone)]
pub struct CreateApp {
    pub team_id: DbId,
    pub name: String,
    pub config: AppConfig,
    pub created_by: DbId,
}

/// DTO for renaming an app or changing its config. `None` fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateApp {
    pub name: Option<String>,
    pub config: Option<AppConfig>,
}
