//! Key-value state service.

use canopy_core::error::CoreError;
use canopy_core::state_type::{StateFamily, StateType};
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use canopy_db::models::kv_state::{CreateKvState, KvState};
use canopy_db::repositories::KvStateRepo;
use canopy_db::DbPool;

use crate::context::EditContext;
use crate::error::StateResult;
use crate::payload::KvEntry;

const ENTITY: &str = "kv_state";

#[derive(Clone)]
pub struct KvStateService {
    pool: DbPool,
}

impl KvStateService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn create_input(ctx: &EditContext, state_type: StateType, entry: &KvEntry) -> CreateKvState {
        CreateKvState {
            team_id: ctx.team_id,
            app_ref_id: ctx.app_id,
            state_type: state_type.id(),
            version: EDIT_VERSION,
            key: entry.key.clone(),
            value: entry.value.clone(),
            user_id: ctx.user_id,
        }
    }

    /// Insert a new key. Surfaces a conflict if the key exists.
    pub async fn create(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        entry: &KvEntry,
    ) -> StateResult<KvState> {
        ensure_kv_type(state_type)?;
        let input = Self::create_input(ctx, state_type, entry);
        Ok(KvStateRepo::create(&self.pool, &input).await?)
    }

    /// Overwrite key and value of the edit-version row with id `id`.
    ///
    /// Rows of another app or of a released version are reported as not found.
    pub async fn update_by_id(
        &self,
        ctx: &EditContext,
        id: DbId,
        entry: &KvEntry,
    ) -> StateResult<KvState> {
        KvStateRepo::update_by_id(
            &self.pool,
            ctx.app_id,
            EDIT_VERSION,
            id,
            &entry.key,
            &entry.value,
            ctx.user_id,
        )
        .await?
            .ok_or_else(|| CoreError::NotFound { entity: ENTITY, id }.into())
    }

    /// Overwrite the value stored under `entry.key`.
    pub async fn update_by_key(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        entry: &KvEntry,
    ) -> StateResult<KvState> {
        ensure_kv_type(state_type)?;
        KvStateRepo::update_by_key(
            &self.pool,
            ctx.app_id,
            state_type.id(),
            EDIT_VERSION,
            &entry.key,
            &entry.value,
            ctx.user_id,
        )
        .await?
        .ok_or_else(|| {
            CoreError::NotFoundByName {
                entity: ENTITY,
                name: entry.key.clone(),
            }
            .into()
        })
    }

    /// Delete a key. Returns `false` if it was not present.
    pub async fn delete_by_key(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        key: &str,
    ) -> StateResult<bool> {
        ensure_kv_type(state_type)?;
        Ok(KvStateRepo::delete_by_key(&self.pool, ctx.app_id, state_type.id(), EDIT_VERSION, key)
            .await?)
    }

    pub async fn get_by_key(
        &self,
        app_id: DbId,
        state_type: StateType,
        version: Version,
        key: &str,
    ) -> StateResult<Option<KvState>> {
        ensure_kv_type(state_type)?;
        Ok(KvStateRepo::find_by_key(&self.pool, app_id, state_type.id(), version, key).await?)
    }

    /// Insert or overwrite by key. Idempotent.
    pub async fn create_or_update(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        entry: &KvEntry,
    ) -> StateResult<KvState> {
        ensure_kv_type(state_type)?;
        let input = Self::create_input(ctx, state_type, entry);
        Ok(KvStateRepo::upsert(&self.pool, &input).await?)
    }

    pub async fn list(
        &self,
        app_id: DbId,
        state_type: StateType,
        version: Version,
    ) -> StateResult<Vec<KvState>> {
        ensure_kv_type(state_type)?;
        Ok(KvStateRepo::list_by_app_version_type(&self.pool, app_id, version, state_type.id())
            .await?)
    }
}

fn ensure_kv_type(state_type: StateType) -> StateResult<()> {
    if state_type.family() != StateFamily::KeyValue {
        return Err(CoreError::Validation(format!(
            "State type {state_type:?} is not a key-value state"
        ))
        .into());
    }
    Ok(())
}
