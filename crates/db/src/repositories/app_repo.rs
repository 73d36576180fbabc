//! Repository for the `apps` table.

use canopy_core::app_config::EditedBy;
use canopy_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::app::{App, CreateApp, UpdateApp};

/// Column list for `apps` queries.
const COLUMNS: &str = "id, uid, team_id, name, release_version, mainline_version, \
                       config, edited_by, created_at, created_by, updated_at, updated_by";

/// Provides CRUD operations for apps.
pub struct AppRepo;

impl AppRepo {
    /// Insert a new app at release 0 / mainline 0.
    pub async fn create<'e, E>(executor: E, input: &CreateApp) -> Result<App, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO apps (team_id, name, config, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, App>(&query)
            .bind(input.team_id)
            .bind(&input.name)
            .bind(Json(&input.config))
            .bind(input.created_by)
            .fetch_one(executor)
            .await
    }

    /// Find an app by id within a team.
    pub async fn find_by_id<'e, E>(
        executor: E,
        team_id: DbId,
        id: DbId,
    ) -> Result<Option<App>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM apps WHERE team_id = $1 AND id = $2");
        sqlx::query_as::<_, App>(&query)
            .bind(team_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find an app by id regardless of team. Used by the realtime path,
    /// where a room is identified by app id alone.
    pub async fn find_by_app_id<'e, E>(executor: E, id: DbId) -> Result<Option<App>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM apps WHERE id = $1");
        sqlx::query_as::<_, App>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lock the app row for the rest of the transaction.
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        team_id: DbId,
        id: DbId,
    ) -> Result<Option<App>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query =
            format!("SELECT {COLUMNS} FROM apps WHERE team_id = $1 AND id = $2 FOR UPDATE");
        sqlx::query_as::<_, App>(&query)
            .bind(team_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List a team's apps, most recently updated first.
    pub async fn list_by_team<'e, E>(executor: E, team_id: DbId) -> Result<Vec<App>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM apps WHERE team_id = $1 ORDER BY updated_at DESC, id DESC"
        );
        sqlx::query_as::<_, App>(&query)
            .bind(team_id)
            .fetch_all(executor)
            .await
    }

    /// Update name and/or config. Returns `None` if the app does not exist.
    pub async fn update<'e, E>(
        executor: E,
        team_id: DbId,
        id: DbId,
        input: &UpdateApp,
        user_id: DbId,
    ) -> Result<Option<App>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE apps SET \
                name = COALESCE($3, name), \
                config = COALESCE($4, config), \
                updated_at = NOW(), \
                updated_by = $5 \
             WHERE team_id = $1 AND id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, App>(&query)
            .bind(team_id)
            .bind(id)
            .bind(input.name.as_deref())
            .bind(input.config.as_ref().map(Json))
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Increment the mainline version by one.
    ///
    /// When `release` is set the release version follows the new mainline.
    /// `public`, when given, overwrites `config.public`. Both counters are
    /// computed from the row's current values in a single statement.
    pub async fn bump_mainline<'e, E>(
        executor: E,
        team_id: DbId,
        id: DbId,
        release: bool,
        public: Option<bool>,
        user_id: DbId,
    ) -> Result<Option<App>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE apps SET \
                mainline_version = mainline_version + 1, \
                release_version = CASE WHEN $3 THEN mainline_version + 1 ELSE release_version END, \
                config = CASE WHEN $4::BOOLEAN IS NULL THEN config \
                              ELSE jsonb_set(config, '{{public}}', to_jsonb($4::BOOLEAN)) END, \
                updated_at = NOW(), \
                updated_by = $5 \
             WHERE team_id = $1 AND id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, App>(&query)
            .bind(team_id)
            .bind(id)
            .bind(release)
            .bind(public)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Replace the recent-editors list.
    pub async fn set_edited_by<'e, E>(
        executor: E,
        id: DbId,
        edited_by: &[EditedBy],
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE apps SET edited_by = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(edited_by))
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bump `updated_at` after a realtime edit.
    pub async fn touch<'e, E>(executor: E, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("UPDATE apps SET updated_at = NOW(), updated_by = $2 WHERE id = $1")
                .bind(id)
                .bind(user_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an app. Dependent state rows go with it via `ON DELETE CASCADE`.
    pub async fn delete<'e, E>(executor: E, team_id: DbId, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM apps WHERE team_id = $1 AND id = $2")
            .bind(team_id)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
