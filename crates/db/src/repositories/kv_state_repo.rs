//! Repository for the `kv_states` table.

use canopy_core::state_type::StateTypeId;
use canopy_core::types::{DbId, Version};
use sqlx::PgExecutor;

use crate::models::kv_state::{CreateKvState, KvState};

/// Column list for `kv_states` queries.
const COLUMNS: &str = "id, uid, team_id, app_ref_id, state_type, version, key, value, \
                       created_at, created_by, updated_at, updated_by";

/// Provides CRUD operations for key-value states.
pub struct KvStateRepo;

impl KvStateRepo {
    /// Insert a row. Fails with a `uq_kv_states_key` violation if the key
    /// already exists.
    pub async fn create<'e, E>(executor: E, input: &CreateKvState) -> Result<KvState, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO kv_states \
                (team_id, app_ref_id, state_type, version, key, value, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(input.team_id)
            .bind(input.app_ref_id)
            .bind(input.state_type)
            .bind(input.version)
            .bind(&input.key)
            .bind(&input.value)
            .bind(input.user_id)
            .fetch_one(executor)
            .await
    }

    /// Insert a row, or overwrite the value if the key exists.
    pub async fn upsert<'e, E>(executor: E, input: &CreateKvState) -> Result<KvState, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO kv_states \
                (team_id, app_ref_id, state_type, version, key, value, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT ON CONSTRAINT uq_kv_states_key DO UPDATE SET \
                value = EXCLUDED.value, \
                updated_at = NOW(), \
                updated_by = EXCLUDED.updated_by \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(input.team_id)
            .bind(input.app_ref_id)
            .bind(input.state_type)
            .bind(input.version)
            .bind(&input.key)
            .bind(&input.value)
            .bind(input.user_id)
            .fetch_one(executor)
            .await
    }

    /// Find a row by key.
    pub async fn find_by_key<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        version: Version,
        key: &str,
    ) -> Result<Option<KvState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM kv_states \
             WHERE app_ref_id = $1 AND state_type = $2 AND version = $3 AND key = $4"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(app_id)
            .bind(state_type)
            .bind(version)
            .bind(key)
            .fetch_optional(executor)
            .await
    }

    /// Overwrite key and value of a row by id within one app version.
    pub async fn update_by_id<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        id: DbId,
        key: &str,
        value: &str,
        user_id: DbId,
    ) -> Result<Option<KvState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE kv_states SET key = $3, value = $4, updated_at = NOW(), updated_by = $5 \
             WHERE app_ref_id = $1 AND id = $2 AND version = $6 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(app_id)
            .bind(id)
            .bind(key)
            .bind(value)
            .bind(user_id)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Overwrite the value stored under a key.
    pub async fn update_by_key<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        version: Version,
        key: &str,
        value: &str,
        user_id: DbId,
    ) -> Result<Option<KvState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE kv_states SET value = $5, updated_at = NOW(), updated_by = $6 \
             WHERE app_ref_id = $1 AND state_type = $2 AND version = $3 AND key = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(app_id)
            .bind(state_type)
            .bind(version)
            .bind(key)
            .bind(value)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Delete the row stored under a key.
    pub async fn delete_by_key<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        version: Version,
        key: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM kv_states \
             WHERE app_ref_id = $1 AND state_type = $2 AND version = $3 AND key = $4",
        )
        .bind(app_id)
        .bind(state_type)
        .bind(version)
        .bind(key)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All rows of one state type at one version, in key order.
    pub async fn list_by_app_version_type<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        state_type: StateTypeId,
    ) -> Result<Vec<KvState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM kv_states \
             WHERE app_ref_id = $1 AND version = $2 AND state_type = $3 \
             ORDER BY key"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(app_id)
            .bind(version)
            .bind(state_type)
            .fetch_all(executor)
            .await
    }

    /// All rows of every state type at one version.
    pub async fn list_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<Vec<KvState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM kv_states \
             WHERE app_ref_id = $1 AND version = $2 \
             ORDER BY state_type, key"
        );
        sqlx::query_as::<_, KvState>(&query)
            .bind(app_id)
            .bind(version)
            .fetch_all(executor)
            .await
    }

    /// Copy every row from one version to another with fresh ids.
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
            "INSERT INTO kv_states \
                (team_id, app_ref_id, state_type, version, key, value, created_by, updated_by) \
             SELECT team_id, app_ref_id, state_type, $3, key, value, $4, $4 \
             FROM kv_states WHERE app_ref_id = $1 AND version = $2",
        )
        .bind(app_id)
        .bind(from_version)
        .bind(to_version)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every row of an app at one version.
    pub async fn delete_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM kv_states WHERE app_ref_id = $1 AND version = $2")
            .bind(app_id)
            .bind(version)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
