//! Action service. Actions are edited over HTTP at the edit version only.

use canopy_core::action::{
    validate_resource_ref, ActionConfig, ActionTriggerMode, ActionType,
};
use canopy_core::error::CoreError;
use canopy_core::naming::validate_display_name;
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use canopy_db::models::action::{Action, CreateAction, UpdateAction};
use canopy_db::repositories::ActionRepo;
use canopy_db::DbPool;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::EditContext;
use crate::error::StateResult;

const ENTITY: &str = "action";

/// Client-supplied action fields, shared by create and update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
    #[serde(rename = "resourceID", default)]
    pub resource_id: DbId,
    pub display_name: String,
    pub action_type: ActionType,
    #[serde(default = "default_trigger_mode")]
    pub trigger_mode: ActionTriggerMode,
    #[serde(default)]
    pub transformer: Value,
    #[serde(default)]
    pub template: Value,
    #[serde(default)]
    pub config: ActionConfig,
}

fn default_trigger_mode() -> ActionTriggerMode {
    ActionTriggerMode::Manually
}

impl ActionInput {
    fn validate(&self) -> Result<(), CoreError> {
        validate_display_name(&self.display_name)?;
        validate_resource_ref(self.action_type, self.resource_id)
    }
}

/// Action as returned to clients: type and trigger mode by name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionView {
    #[serde(rename = "actionID")]
    pub action_id: DbId,
    #[serde(rename = "appID")]
    pub app_id: DbId,
    #[serde(rename = "resourceID")]
    pub resource_id: DbId,
    pub version: Version,
    pub display_name: String,
    pub action_type: ActionType,
    pub trigger_mode: ActionTriggerMode,
    pub transformer: Value,
    pub template: Value,
    pub config: ActionConfig,
    pub created_at: canopy_core::types::Timestamp,
    pub updated_at: canopy_core::types::Timestamp,
}

impl TryFrom<Action> for ActionView {
    type Error = CoreError;

    fn try_from(row: Action) -> Result<Self, Self::Error> {
        Ok(Self {
            action_id: row.id,
            app_id: row.app_ref_id,
            resource_id: row.resource_ref_id,
            version: row.version,
            display_name: row.name,
            action_type: ActionType::try_from(row.action_type)?,
            trigger_mode: ActionTriggerMode::parse(&row.trigger_mode)?,
            transformer: row.transformer.0,
            template: row.template.0,
            config: row.config.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct ActionService {
    pool: DbPool,
}

impl ActionService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, ctx: &EditContext, input: ActionInput) -> StateResult<ActionView> {
        input.validate()?;
        let create = CreateAction {
            team_id: ctx.team_id,
            app_ref_id: ctx.app_id,
            version: EDIT_VERSION,
            resource_ref_id: input.resource_id,
            name: input.display_name,
            action_type: input.action_type.id(),
            trigger_mode: input.trigger_mode.as_str().to_string(),
            transformer: input.transformer,
            template: input.template,
            config: input.config,
            user_id: ctx.user_id,
        };
        let row = ActionRepo::create(&self.pool, &create).await?;
        tracing::info!(app_id = ctx.app_id, action_id = row.id, "Action created");
        Ok(ActionView::try_from(row)?)
    }

    pub async fn update(
        &self,
        ctx: &EditContext,
        action_id: DbId,
        input: ActionInput,
    ) -> StateResult<ActionView> {
        input.validate()?;
        let update = UpdateAction {
            resource_ref_id: input.resource_id,
            name: input.display_name,
            action_type: input.action_type.id(),
            trigger_mode: input.trigger_mode.as_str().to_string(),
            transformer: input.transformer,
            template: input.template,
            config: input.config,
            user_id: ctx.user_id,
        };
        let row = ActionRepo::update(&self.pool, ctx.app_id, EDIT_VERSION, action_id, &update)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY,
                id: action_id,
            })?;
        Ok(ActionView::try_from(row)?)
    }

    /// Delete an edit-version action. Returns `false` if it did not exist.
    pub async fn delete(&self, ctx: &EditContext, action_id: DbId) -> StateResult<bool> {
        Ok(ActionRepo::delete(&self.pool, ctx.app_id, EDIT_VERSION, action_id).await?)
    }

    pub async fn get(&self, app_id: DbId, action_id: DbId) -> StateResult<ActionView> {
        let row = ActionRepo::find_by_id(&self.pool, app_id, action_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY,
                id: action_id,
            })?;
        Ok(ActionView::try_from(row)?)
    }

    pub async fn list(&self, app_id: DbId, version: Version) -> StateResult<Vec<ActionView>> {
        ActionRepo::list_by_app_version(&self.pool, app_id, version)
            .await?
            .into_iter()
            .map(|row| ActionView::try_from(row).map_err(Into::into))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_defaults() {
        let input: ActionInput = serde_json::from_value(json!({
            "displayName": "query1",
            "actionType": "postgresql",
            "resourceID": 5
        }))
        .unwrap();
        assert_eq!(input.trigger_mode, ActionTriggerMode::Manually);
        assert!(!input.config.public);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn input_requires_resource_for_remote_kinds() {
        let input: ActionInput = serde_json::from_value(json!({
            "displayName": "query1",
            "actionType": "mysql"
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn input_rejects_bad_display_name() {
        let input: ActionInput = serde_json::from_value(json!({
            "displayName": "1query",
            "actionType": "transformer"
        }))
        .unwrap();
        assert!(input.validate().is_err());
    }
}
