//! Repository for the `tree_states` table.

use canopy_core::state_type::StateTypeId;
use canopy_core::tree::SUMMIT_PARENT_ID;
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use sqlx::types::Json;
use sqlx::PgExecutor;

use crate::models::tree_state::{CreateTreeState, TreeState};

/// Column list for `tree_states` queries.
const COLUMNS: &str = "id, uid, team_id, app_ref_id, state_type, version, \
                       parent_node_ref_id, children_node_ref_ids, name, content, \
                       created_at, created_by, updated_at, updated_by";

/// Provides CRUD operations for tree nodes.
pub struct TreeStateRepo;

impl TreeStateRepo {
    /// Insert a node and return the stored row.
    pub async fn create<'e, E>(executor: E, input: &CreateTreeState) -> Result<TreeState, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO tree_states \
                (team_id, app_ref_id, state_type, version, parent_node_ref_id, \
                 children_node_ref_ids, name, content, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TreeState>(&query)
            .bind(input.team_id)
            .bind(input.app_ref_id)
            .bind(input.state_type)
            .bind(input.version)
            .bind(input.parent_node_ref_id)
            .bind(Json(&input.children_node_ref_ids))
            .bind(&input.name)
            .bind(&input.content)
            .bind(input.user_id)
            .fetch_one(executor)
            .await
    }

    /// Find a node by id within an app.
    pub async fn find_by_id<'e, E>(
        executor: E,
        app_id: DbId,
        id: DbId,
    ) -> Result<Option<TreeState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query =
            format!("SELECT {COLUMNS} FROM tree_states WHERE app_ref_id = $1 AND id = $2");
        sqlx::query_as::<_, TreeState>(&query)
            .bind(app_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find an edit-version node by display name.
    ///
    /// Name lookups only ever target the mutable draft.
    pub async fn find_edit_by_name<'e, E>(
        executor: E,
        app_id: DbId,
        state_type: StateTypeId,
        name: &str,
    ) -> Result<Option<TreeState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM tree_states \
             WHERE app_ref_id = $1 AND version = $2 AND state_type = $3 AND name = $4"
        );
        sqlx::query_as::<_, TreeState>(&query)
            .bind(app_id)
            .bind(EDIT_VERSION)
            .bind(state_type)
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Find the summit (parent id 0) of one tree.
    pub async fn find_summit<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        state_type: StateTypeId,
    ) -> Result<Option<TreeState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM tree_states \
             WHERE app_ref_id = $1 AND version = $2 AND state_type = $3 \
               AND parent_node_ref_id = $4"
        );
        sqlx::query_as::<_, TreeState>(&query)
            .bind(app_id)
            .bind(version)
            .bind(state_type)
            .bind(SUMMIT_PARENT_ID)
            .fetch_optional(executor)
            .await
    }

    /// All nodes of one tree.
    pub async fn list_by_app_version_type<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
        state_type: StateTypeId,
    ) -> Result<Vec<TreeState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM tree_states \
             WHERE app_ref_id = $1 AND version = $2 AND state_type = $3 \
             ORDER BY id"
        );
        sqlx::query_as::<_, TreeState>(&query)
            .bind(app_id)
            .bind(version)
            .bind(state_type)
            .fetch_all(executor)
            .await
    }

    /// All nodes of every tree type at one version. Used by version copy.
    pub async fn list_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<Vec<TreeState>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM tree_states \
             WHERE app_ref_id = $1 AND version = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, TreeState>(&query)
            .bind(app_id)
            .bind(version)
            .fetch_all(executor)
            .await
    }

    /// Replace a node's content. Links are left untouched.
    pub async fn update_content<'e, E>(
        executor: E,
        id: DbId,
        content: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE tree_states SET content = $2, updated_at = NOW(), updated_by = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(content)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace a node's parent and ordered children.
    pub async fn update_links<'e, E>(
        executor: E,
        id: DbId,
        parent_node_ref_id: DbId,
        children_node_ref_ids: &[DbId],
        user_id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE tree_states SET parent_node_ref_id = $2, children_node_ref_ids = $3, \
                 updated_at = NOW(), updated_by = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(parent_node_ref_id)
        .bind(Json(children_node_ref_ids))
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace only a node's ordered children.
    pub async fn update_children<'e, E>(
        executor: E,
        id: DbId,
        children_node_ref_ids: &[DbId],
        user_id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE tree_states SET children_node_ref_ids = $2, \
                 updated_at = NOW(), updated_by = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(Json(children_node_ref_ids))
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace parent and content in one write. Used by move.
    pub async fn update_parent_and_content<'e, E>(
        executor: E,
        id: DbId,
        parent_node_ref_id: DbId,
        content: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE tree_states SET parent_node_ref_id = $2, content = $3, \
                 updated_at = NOW(), updated_by = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(parent_node_ref_id)
        .bind(content)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a set of nodes by id. Returns the number deleted.
    pub async fn delete_by_ids<'e, E>(executor: E, ids: &[DbId]) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tree_states WHERE id = ANY($1)")
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every node of an app at one version.
    pub async fn delete_by_app_version<'e, E>(
        executor: E,
        app_id: DbId,
        version: Version,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tree_states WHERE app_ref_id = $1 AND version = $2")
            .bind(app_id)
            .bind(version)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
