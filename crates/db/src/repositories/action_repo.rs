//! Repository for the `actions` table.

use canopy_core::types::{DbId, Version};
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::action::{Action, CreateAction, UpdateAction};

/// Column list for `actions` queries.
const COLUMNS: &str = "id, uid, team_id, app_ref_id, version, resource_ref_id, name, \
                       action_type, trigger_mode, transformer, template, config, \
                       created_at, created_by, updated_at, updated_by";

/// Provides CRUD operations for actions.
pub struct ActionRepo;

impl ActionRepo {
    pub async fn create<'e, E>(executor: E, input: &CreateAction) -> Result<Action, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO actions \
                (team_id, app_ref_id, version, resource_ref_id, name, action_type, \
                 trigger_mode, transformer, template, config, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Action>(&query)
            .bind(input.team_id)
            .bind(input.app_ref_id)
            .bind(input.version)
            .bind(input.resource_ref_id)
            .bind(&input.name)
            .bind(input.action_type)
            .bind(&input.trigger_mode)
            .bind(Json(&input.transformer))
            .bind(Json(&input.template))
            .bind(Json(&input.config))
            .bind(input.user_id)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        app_id: DbId,
        id: DbId,
    ) -> Result<Option<Action>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM actions WHERE app_ref_id = $1 AND id = $2");
        sqlx::query_as::<_, Action>(&query)
            .bind(app_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// All actions of an app at one version, in creation order.
    pub async fn list_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<Vec<Action>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM actions WHERE app_ref_id = $1 AND version = $2 ORDER BY id"
        );
        sqlx::query_as::<_, Action>(&query)
            .bind(app_id)
            .bind(version)
            .fetch_all(executor)
            .await
    }

    /// Update an action in place at the given version.
    ///
    /// The id, owning app, and version are never rewritten.
    pub async fn update<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        id: DbId,
        input: &UpdateAction,
    ) -> Result<Option<Action>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE actions SET \
                resource_ref_id = $4, name = $5, action_type = $6, trigger_mode = $7, \
                transformer = $8, template = $9, config = $10, \
                updated_at = NOW(), updated_by = $11 \
             WHERE app_ref_id = $1 AND version = $2 AND id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Action>(&query)
            .bind(app_id)
            .bind(version)
            .bind(id)
            .bind(input.resource_ref_id)
            .bind(&input.name)
            .bind(input.action_type)
            .bind(&input.trigger_mode)
            .bind(Json(&input.transformer))
            .bind(Json(&input.template))
            .bind(Json(&input.config))
            .bind(input.user_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn delete<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM actions WHERE app_ref_id = $1 AND version = $2 AND id = $3")
                .bind(app_id)
                .bind(version)
                .bind(id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Copy every action from one version to another with fresh ids.
    pub async fn copy_version<'e, E>(
        executor: E,
        app_id: DbId,
        from_version: Version,
        to_version: Version,
        user_id: DbId,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO actions \
                (team_id, app_ref_id, version, resource_ref_id, name, action_type, \
                 trigger_mode, transformer, template, config, created_by, updated_by) \
             SELECT team_id, app_ref_id, $3, resource_ref_id, name, action_type, \
                 trigger_mode, transformer, template, config, $4, $4 \
             FROM actions WHERE app_ref_id = $1 AND version = $2",
        )
        .bind(app_id)
        .bind(from_version)
        .bind(to_version)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM actions WHERE app_ref_id = $1 AND version = $2")
            .bind(app_id)
            .bind(version)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
