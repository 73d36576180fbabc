//! Repository for the `set_states` table.

use canopy_core::state_type::StateTypeId;
use canopy_core::types::{DbId, Version};
use sqlx::PgExecutor;

use crate::models::set_state::{CreateSetState, SetState};

/// Column list for `set_states` queries.
const COLUMNS: &str = "id, uid, team_id, app_ref_id, state_type, version, value, \
                       created_at, created_by, updated_at, updated_by";

/// Provides CRUD operations for set members.
pub struct SetStateRepo;

impl SetStateRepo {
    /// Insert a member. Fails with a `uq_set_states_value` violation if it is
    /// already present.
    pub async fn create<'e, E>(executor: E, input: &CreateSetState) -> Result<SetState, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO set_states \
                (team_id, app_ref_id, state_type, version, value, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SetState>(&query)
            .bind(input.team_id)
            .bind(input.app_ref_id)
            .bind(input.state_type)
            .bind(input.version)
            .bind(&input.value)
            .bind(input.user_id)
            .fetch_one(executor)
            .await
    }

    /// Insert a member unless present.
    ///
    /// Returns `None` when the member already existed.
    pub async fn create_if_absent<'e, E>(
        executor: E,
        input: &CreateSetState,
    ) -> Result<Option<SetState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO set_states \
                (team_id, app_ref_id, state_type, version, value, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT ON CONSTRAINT uq_set_states_value DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SetState>(&query)
            .bind(input.team_id)
            .bind(input.app_ref_id)
            .bind(input.state_type)
            .bind(input.version)
            .bind(&input.value)
            .bind(input.user_id)
            .fetch_optional(executor)
            .await
    }

    /// Find a member by value.
    pub async fn find_by_value<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        version: Version,
        value: &str,
    ) -> Result<Option<SetState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM set_states \
             WHERE app_ref_id = $1 AND state_type = $2 AND version = $3 AND value = $4"
        );
        sqlx::query_as::<_, SetState>(&query)
            .bind(app_id)
            .bind(state_type)
            .bind(version)
            .bind(value)
            .fetch_optional(executor)
            .await
    }

    /// Replace member `before` with `after`.
    pub async fn update_by_value<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        version: Version,
        before: &str,
        after: &str,
        user_id: DbId,
    ) -> Result<Option<SetState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE set_states SET value = $5, updated_at = NOW(), updated_by = $6 \
             WHERE app_ref_id = $1 AND state_type = $2 AND version = $3 AND value = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SetState>(&query)
            .bind(app_id)
            .bind(state_type)
            .bind(version)
            .bind(before)
            .bind(after)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Remove a member.
    pub async fn delete_by_value<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        version: Version,
        value: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM set_states \
             WHERE app_ref_id = $1 AND state_type = $2 AND version = $3 AND value = $4",
        )
        .bind(app_id)
        .bind(state_type)
        .bind(version)
        .bind(value)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All members of one state type at one version, in value order.
    pub async fn list_by_app_version_type<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        state_type: StateTypeId,
    ) -> Result<Vec<SetState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM set_states \
             WHERE app_ref_id = $1 AND version = $2 AND state_type = $3 \
             ORDER BY value"
        );
        sqlx::query_as::<_, SetState>(&query)
            .bind(app_id)
            .bind(version)
            .bind(state_type)
            .fetch_all(executor)
            .await
    }

    /// Copy every member from one version to another with fresh ids.
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
            "INSERT INTO set_states \
                (team_id, app_ref_id, state_type, version, value, created_by, updated_by) \
             SELECT team_id, app_ref_id, state_type, $3, value, $4, $4 \
             FROM set_states WHERE app_ref_id = $1 AND version = $2",
        )
        .bind(app_id)
        .bind(from_version)
        .bind(to_version)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every member of an app at one version.
    pub async fn delete_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM set_states WHERE app_ref_id = $1 AND version = $2")
            .bind(app_id)
            .bind(version)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
