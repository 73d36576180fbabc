//! Copying and clearing whole versions of an app's state.
//!
//! These run on a caller-owned connection so release, snapshot, and recover
//! can wrap them in one transaction together with the version bump.

use std::collections::HashMap;

use canopy_core::tree::{remap_links, FlatTreeNode};
use canopy_core::types::{DbId, Version};
use canopy_db::models::tree_state::CreateTreeState;
use canopy_db::repositories::{ActionRepo, KvStateRepo, SetStateRepo, TreeStateRepo};
use sqlx::PgConnection;

use crate::error::StateResult;

/// Row counts copied per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub tree_states: u64,
    pub kv_states: u64,
    pub set_states: u64,
    pub actions: u64,
}

/// Copy every state family of `app_id` from `from_version` to `to_version`.
///
/// The destination version is assumed empty.
pub async fn copy_version(
    conn: &mut PgConnection,
    app_id: DbId,
    from_version: Version,
    to_version: Version,
    user_id: DbId,
) -> StateResult<CopyStats> {
    let id_map = copy_tree_states(conn, app_id, from_version, to_version, user_id).await?;
    let kv_states =
        KvStateRepo::copy_version(&mut *conn, app_id, from_version, to_version, user_id).await?;
    let set_states =
        SetStateRepo::copy_version(&mut *conn, app_id, from_version, to_version, user_id).await?;
    let actions =
        ActionRepo::copy_version(&mut *conn, app_id, from_version, to_version, user_id).await?;

    let stats = CopyStats {
        tree_states: id_map.len() as u64,
        kv_states,
        set_states,
        actions,
    };
    tracing::debug!(
        app_id,
        from_version,
        to_version,
        tree_states = stats.tree_states,
        kv_states = stats.kv_states,
        set_states = stats.set_states,
        actions = stats.actions,
        "Copied app version"
    );
    Ok(stats)
}

/// Copy tree rows with fresh ids, preserving structure.
///
/// Pass one inserts each row with its original links and records
/// `old id -> new id`. Pass two rewrites every copied row's parent and
/// children through that map. Returns the map.
pub async fn copy_tree_states(
    conn: &mut PgConnection,
    app_id: DbId,
    from_version: Version,
    to_version: Version,
    user_id: DbId,
) -> StateResult<HashMap<DbId, DbId>> {
    let rows = TreeStateRepo::list_by_app_version(&mut *conn, app_id, from_version).await?;

    let mut id_map = HashMap::with_capacity(rows.len());
    let mut new_ids = Vec::with_capacity(rows.len());
    for row in &rows {
        let input = CreateTreeState {
            team_id: row.team_id,
            app_ref_id: row.app_ref_id,
            state_type: row.state_type,
            version: to_version,
            parent_node_ref_id: row.parent_node_ref_id,
            children_node_ref_ids: row.children_node_ref_ids.0.clone(),
            name: row.name.clone(),
            content: row.content.clone(),
            user_id,
        };
        let created = TreeStateRepo::create(&mut *conn, &input).await?;
        id_map.insert(row.id, created.id);
        new_ids.push(created.id);
    }

    for (row, new_id) in rows.iter().zip(new_ids) {
        let (parent, children) = remap_links(row.parent_id(), row.children_ids(), &id_map)?;
        TreeStateRepo::update_links(&mut *conn, new_id, parent, &children, user_id).await?;
    }

    Ok(id_map)
}

/// Delete every state family of `app_id` at `version`.
pub async fn delete_version(
    conn: &mut PgConnection,
    app_id: DbId,
    version: Version,
) -> StateResult<()> {
    let tree_states = TreeStateRepo::delete_by_app_version(&mut *conn, app_id, version).await?;
    let kv_states = KvStateRepo::delete_by_app_version(&mut *conn, app_id, version).await?;
    let set_states = SetStateRepo::delete_by_app_version(&mut *conn, app_id, version).await?;
    let actions = ActionRepo::delete_by_app_version(&mut *conn, app_id, version).await?;
    tracing::debug!(
        app_id,
        version,
        tree_states,
        kv_states,
        set_states,
        actions,
        "Cleared app version"
    );
    Ok(())
}
