//! Repository for the `app_snapshots` table.

use canopy_core::history::{AppModifyHistory, TriggerModeId};
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::app_snapshot::AppSnapshot;

/// Column list for `app_snapshots` queries.
const COLUMNS: &str = "id, uid, team_id, app_ref_id, target_version, trigger_mode, \
                       modify_history, created_at";

/// Provides CRUD operations for app snapshots.
pub struct AppSnapshotRepo;

impl AppSnapshotRepo {
    pub async fn create<'e, E>(
        executor: E,
        team_id: DbId,
        app_id: DbId,
        target_version: Version,
        trigger_mode: TriggerModeId,
        modify_history: &[AppModifyHistory],
    ) -> Result<AppSnapshot, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO app_snapshots \
                (team_id, app_ref_id, target_version, trigger_mode, modify_history) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppSnapshot>(&query)
            .bind(team_id)
            .bind(app_id)
            .bind(target_version)
            .bind(trigger_mode)
            .bind(Json(modify_history))
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        app_id: DbId,
        id: DbId,
    ) -> Result<Option<AppSnapshot>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query =
            format!("SELECT {COLUMNS} FROM app_snapshots WHERE app_ref_id = $1 AND id = $2");
        sqlx::query_as::<_, AppSnapshot>(&query)
            .bind(app_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// The edit-version snapshot of an app, if one exists.
    pub async fn find_edit<'e, E>(
        executor: E,
        app_id: DbId,
    ) -> Result<Option<AppSnapshot>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM app_snapshots WHERE app_ref_id = $1 AND target_version = $2"
        );
        sqlx::query_as::<_, AppSnapshot>(&query)
            .bind(app_id)
            .bind(EDIT_VERSION)
            .fetch_optional(executor)
            .await
    }

    /// The edit-version snapshot, locked for the rest of the transaction.
    pub async fn find_edit_for_update<'e, E>(
        executor: E,
        app_id: DbId,
    ) -> Result<Option<AppSnapshot>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM app_snapshots \
             WHERE app_ref_id = $1 AND target_version = $2 \
             FOR UPDATE"
        );
        sqlx::query_as::<_, AppSnapshot>(&query)
            .bind(app_id)
            .bind(EDIT_VERSION)
            .fetch_optional(executor)
            .await
    }

    pub async fn update_history<'e, E>(
        executor: E,
        id: DbId,
        modify_history: &[AppModifyHistory],
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE app_snapshots SET modify_history = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(modify_history))
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a snapshot to a published version and replace its history.
    pub async fn archive<'e, E>(
        executor: E,
        id: DbId,
        target_version: Version,
        trigger_mode: TriggerModeId,
        modify_history: &[AppModifyHistory],
    ) -> Result<Option<AppSnapshot>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE app_snapshots SET target_version = $2, trigger_mode = $3, \
                 modify_history = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppSnapshot>(&query)
            .bind(id)
            .bind(target_version)
            .bind(trigger_mode)
            .bind(Json(modify_history))
            .fetch_optional(executor)
            .await
    }

    /// Archived snapshots of an app, newest version first.
    pub async fn list_archived<'e, E>(
        executor: E,
        app_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AppSnapshot>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM app_snapshots \
             WHERE app_ref_id = $1 AND target_version <> $2 \
             ORDER BY target_version DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, AppSnapshot>(&query)
            .bind(app_id)
            .bind(EDIT_VERSION)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count_archived<'e, E>(executor: E, app_id: DbId) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM app_snapshots WHERE app_ref_id = $1 AND target_version <> $2",
        )
        .bind(app_id)
        .bind(EDIT_VERSION)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }
}
