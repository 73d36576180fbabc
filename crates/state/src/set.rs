//! Set state service. The value is the identity; there is no separate key.

use canopy_core::error::CoreError;
use canopy_core::state_type::{StateFamily, StateType};
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use canopy_db::models::set_state::{CreateSetState, SetState};
use canopy_db::repositories::SetStateRepo;
use canopy_db::DbPool;

use crate::context::EditContext;
use crate::error::StateResult;
use crate::payload::SetUpdate;

const ENTITY: &str = "set_state";

#[derive(Clone)]
pub struct SetStateService {
    pool: DbPool,
}

impl SetStateService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn create_input(ctx: &EditContext, state_type: StateType, value: &str) -> CreateSetState {
        CreateSetState {
            team_id: ctx.team_id,
            app_ref_id: ctx.app_id,
            state_type: state_type.id(),
            version: EDIT_VERSION,
            value: value.to_string(),
            user_id: ctx.user_id,
        }
    }

    /// Add a member. Surfaces a conflict if it is already present.
    pub async fn create(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        value: &str,
    ) -> StateResult<SetState> {
        ensure_set_type(state_type)?;
        let input = Self::create_input(ctx, state_type, value);
        Ok(SetStateRepo::create(&self.pool, &input).await?)
    }

    /// Rename member `update.before` to `update.after`.
    pub async fn update_by_value(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        update: &SetUpdate,
    ) -> StateResult<SetState> {
        ensure_set_type(state_type)?;
        SetStateRepo::update_by_value(
            &self.pool,
            ctx.app_id,
            state_type.id(),
            EDIT_VERSION,
            &update.before,
            &update.after,
            ctx.user_id,
        )
        .await?
        .ok_or_else(|| {
            CoreError::NotFoundByName {
                entity: ENTITY,
                name: update.before.clone(),
            }
            .into()
        })
    }

    /// Remove a member. Returns `false` if it was not present.
    pub async fn delete_by_value(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        value: &str,
    ) -> StateResult<bool> {
        ensure_set_type(state_type)?;
        Ok(
            SetStateRepo::delete_by_value(&self.pool, ctx.app_id, state_type.id(), EDIT_VERSION, value)
                .await?,
        )
    }

    pub async fn get_by_value(
        &self,
        app_id: DbId,
        state_type: StateType,
        version: Version,
        value: &str,
    ) -> StateResult<Option<SetState>> {
        ensure_set_type(state_type)?;
        Ok(SetStateRepo::find_by_value(&self.pool, app_id, state_type.id(), version, value).await?)
    }

    /// Add a member unless present. Idempotent.
    pub async fn create_or_update(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        value: &str,
    ) -> StateResult<SetState> {
        ensure_set_type(state_type)?;
        let input = Self::create_input(ctx, state_type, value);
        if let Some(created) = SetStateRepo::create_if_absent(&self.pool, &input).await? {
            return Ok(created);
        }
        SetStateRepo::find_by_value(&self.pool, ctx.app_id, state_type.id(), EDIT_VERSION, value)
            .await?
            .ok_or_else(|| {
                CoreError::Internal(format!("Set member '{value}' vanished after upsert")).into()
            })
    }

    pub async fn list(
        &self,
        app_id: DbId,
        state_type: StateType,
        version: Version,
    ) -> StateResult<Vec<SetState>> {
        ensure_set_type(state_type)?;
        Ok(SetStateRepo::list_by_app_version_type(&self.pool, app_id, version, state_type.id())
            .await?)
    }
}

fn ensure_set_type(state_type: StateType) -> StateResult<()> {
    if state_type.family() != StateFamily::Set {
        return Err(CoreError::Validation(format!(
            "State type {state_type:?} is not a set state"
        ))
        .into());
    }
    Ok(())
}
