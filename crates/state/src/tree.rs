//! Tree-state service: recursive mutations over the flat component tree.
//!
//! Every mutation runs in one transaction. Multi-row writes (subtree
//! insert, recursive delete, move) either land completely or not at all.

use std::collections::{HashMap, VecDeque};

use canopy_core::component::ComponentNode;
use canopy_core::error::CoreError;
use canopy_core::naming::validate_display_name;
use canopy_core::state_type::{StateFamily, StateType};
use canopy_core::tree::{
    attach_child, attach_child_at, build_component_tree, collect_subtree_ids, detach_child,
    find_summit, index_by_id, is_in_subtree, FlatTreeNode, SUMMIT_PARENT_ID,
};
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use canopy_db::models::tree_state::{CreateTreeState, TreeState};
use canopy_db::repositories::TreeStateRepo;
use canopy_db::DbPool;
use sqlx::PgConnection;

use crate::context::EditContext;
use crate::error::{StateError, StateResult};

const ENTITY: &str = "component";

#[derive(Clone)]
pub struct TreeStateService {
    pool: DbPool,
}

impl TreeStateService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persist `tree` (with any nested children) under `parent_id`.
    ///
    /// A `parent_id` of 0 creates the summit, which fails if the tree already
    /// has one. Returns the id of the subtree's top node.
    pub async fn create_component_tree(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        parent_id: DbId,
        tree: &ComponentNode,
    ) -> StateResult<DbId> {
        ensure_tree_type(state_type)?;
        let mut tx = self.pool.begin().await?;
        let id = insert_subtree(&mut tx, ctx, state_type, parent_id, tree, None).await?;
        tx.commit().await?;
        tracing::debug!(app_id = ctx.app_id, name = %tree.display_name, id, "Created component subtree");
        Ok(id)
    }

    /// Like [`create_component_tree`](Self::create_component_tree), with the
    /// parent resolved from the node's `parentNode` display name.
    pub async fn create_component_tree_by_parent_name(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        tree: &ComponentNode,
    ) -> StateResult<DbId> {
        ensure_tree_type(state_type)?;
        let mut tx = self.pool.begin().await?;
        let parent_id = resolve_parent_id(&mut tx, ctx, state_type, &tree.parent_node).await?;
        let id = insert_subtree(&mut tx, ctx, state_type, parent_id, tree, None).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Replace the content of the node named `node.display_name`.
    ///
    /// Parent and children links are left as they are.
    pub async fn update_tree_state(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        node: &ComponentNode,
    ) -> StateResult<()> {
        ensure_tree_type(state_type)?;
        let row = self.require_by_name(ctx, state_type, &node.display_name).await?;
        let content = node.to_content()?;
        TreeStateRepo::update_content(&self.pool, row.id, &content, ctx.user_id).await?;
        Ok(())
    }

    /// Delete the named node and its whole subtree, and unlink it from its
    /// parent. Returns the number of rows deleted.
    pub async fn delete_tree_state_node_recursive(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        name: &str,
    ) -> StateResult<usize> {
        ensure_tree_type(state_type)?;
        let mut tx = self.pool.begin().await?;
        let rows = TreeStateRepo::list_by_app_version_type(
            &mut *tx,
            ctx.app_id,
            EDIT_VERSION,
            state_type.id(),
        )
        .await?;
        let index = index_by_id(&rows);
        let target = find_by_name(&rows, name)?;
        if target.parent_id() == SUMMIT_PARENT_ID {
            return Err(CoreError::Validation("The summit component cannot be deleted".into()).into());
        }

        let ids = collect_subtree_ids(target.id, &index)?;
        if let Some(parent) = index.get(&target.parent_id()) {
            let mut children = parent.children_ids().to_vec();
            detach_child(&mut children, target.id);
            TreeStateRepo::update_children(&mut *tx, parent.id, &children, ctx.user_id).await?;
        }
        let deleted = TreeStateRepo::delete_by_ids(&mut *tx, &ids).await?;
        tx.commit().await?;

        tracing::debug!(app_id = ctx.app_id, name, deleted, "Deleted component subtree");
        Ok(ids.len())
    }

    /// Move the named node under the node named by its `parentNode` field,
    /// and store its new content.
    ///
    /// Fails without changes if the new parent is the node itself or one of
    /// its descendants, or if the node is the summit.
    pub async fn move_tree_state_node(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        node: &ComponentNode,
    ) -> StateResult<()> {
        ensure_tree_type(state_type)?;
        if node.parent_node == node.display_name {
            return Err(CoreError::Validation(format!(
                "Component '{}' cannot be its own parent",
                node.display_name
            ))
            .into());
        }
        if node.parent_node.is_empty() {
            return Err(CoreError::Validation(format!(
                "Component '{}' must name a parent to move under",
                node.display_name
            ))
            .into());
        }

        let content = node.to_content()?;
        let mut tx = self.pool.begin().await?;
        let rows = TreeStateRepo::list_by_app_version_type(
            &mut *tx,
            ctx.app_id,
            EDIT_VERSION,
            state_type.id(),
        )
        .await?;
        let index = index_by_id(&rows);
        let target = find_by_name(&rows, &node.display_name)?;
        if target.parent_id() == SUMMIT_PARENT_ID {
            return Err(CoreError::Validation("The summit component cannot be moved".into()).into());
        }
        let new_parent = find_by_name(&rows, &node.parent_node)?;
        if is_in_subtree(target.id, new_parent.id, &index) {
            return Err(CoreError::Validation(format!(
                "Component '{}' cannot move under its own descendant '{}'",
                node.display_name, node.parent_node
            ))
            .into());
        }

        if new_parent.id == target.parent_id() {
            TreeStateRepo::update_content(&mut *tx, target.id, &content, ctx.user_id).await?;
        } else {
            if let Some(old_parent) = index.get(&target.parent_id()) {
                let mut children = old_parent.children_ids().to_vec();
                detach_child(&mut children, target.id);
                TreeStateRepo::update_children(&mut *tx, old_parent.id, &children, ctx.user_id)
                    .await?;
            }
            let mut children = new_parent.children_ids().to_vec();
            attach_child(&mut children, target.id);
            TreeStateRepo::update_children(&mut *tx, new_parent.id, &children, ctx.user_id).await?;
            TreeStateRepo::update_parent_and_content(
                &mut *tx,
                target.id,
                new_parent.id,
                &content,
                ctx.user_id,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Create the node if its name is unused, otherwise update it in place
    /// (moving it if the payload names a different parent).
    ///
    /// Never surfaces a duplicate-name conflict.
    pub async fn create_or_update(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        node: &ComponentNode,
    ) -> StateResult<()> {
        ensure_tree_type(state_type)?;
        let existing = TreeStateRepo::find_edit_by_name(
            &self.pool,
            ctx.app_id,
            state_type.id(),
            &node.display_name,
        )
        .await?;

        match existing {
            Some(row) => {
                if row.parent_node_ref_id == SUMMIT_PARENT_ID || node.parent_node.is_empty() {
                    self.update_tree_state(ctx, state_type, node).await
                } else {
                    self.move_tree_state_node(ctx, state_type, node).await
                }
            }
            None => match self
                .create_component_tree_by_parent_name(ctx, state_type, node)
                .await
            {
                Ok(_) => Ok(()),
                // Lost a race with a concurrent create of the same name.
                Err(e) if e.is_conflict() => self.update_tree_state(ctx, state_type, node).await,
                Err(e) => Err(e),
            },
        }
    }

    /// Replace the named node's whole subtree with `node`, keeping its
    /// position under its current parent. Creates it when absent.
    pub async fn put(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        node: &ComponentNode,
    ) -> StateResult<DbId> {
        ensure_tree_type(state_type)?;
        let mut tx = self.pool.begin().await?;
        let existing = TreeStateRepo::find_edit_by_name(
            &mut *tx,
            ctx.app_id,
            state_type.id(),
            &node.display_name,
        )
        .await?;

        let id = match existing {
            None => {
                let parent_id =
                    resolve_parent_id(&mut tx, ctx, state_type, &node.parent_node).await?;
                insert_subtree(&mut tx, ctx, state_type, parent_id, node, None).await?
            }
            Some(row) => {
                let rows = TreeStateRepo::list_by_app_version_type(
                    &mut *tx,
                    ctx.app_id,
                    EDIT_VERSION,
                    state_type.id(),
                )
                .await?;
                let index = index_by_id(&rows);
                let ids = collect_subtree_ids(row.id, &index)?;

                let mut parent_id = SUMMIT_PARENT_ID;
                let mut position = None;
                if let Some(parent) = index.get(&row.parent_node_ref_id) {
                    let mut children = parent.children_ids().to_vec();
                    position = children.iter().position(|id| *id == row.id);
                    detach_child(&mut children, row.id);
                    TreeStateRepo::update_children(&mut *tx, parent.id, &children, ctx.user_id)
                        .await?;
                    parent_id = parent.id;
                }
                TreeStateRepo::delete_by_ids(&mut *tx, &ids).await?;
                insert_subtree(&mut tx, ctx, state_type, parent_id, node, position).await?
            }
        };
        tx.commit().await?;
        Ok(id)
    }

    /// Rebuild the nested tree of one version. `None` if the tree is empty.
    pub async fn get_tree(
        &self,
        app_id: DbId,
        version: Version,
        state_type: StateType,
    ) -> StateResult<Option<ComponentNode>> {
        ensure_tree_type(state_type)?;
        let rows =
            TreeStateRepo::list_by_app_version_type(&self.pool, app_id, version, state_type.id())
                .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let summit = find_summit(&rows)?;
        let index = index_by_id(&rows);
        Ok(Some(build_component_tree(summit, &index)?))
    }

    /// Look up an edit-version node by display name.
    pub async fn get_by_name(
        &self,
        app_id: DbId,
        state_type: StateType,
        name: &str,
    ) -> StateResult<Option<TreeState>> {
        Ok(TreeStateRepo::find_edit_by_name(&self.pool, app_id, state_type.id(), name).await?)
    }

    async fn require_by_name(
        &self,
        ctx: &EditContext,
        state_type: StateType,
        name: &str,
    ) -> StateResult<TreeState> {
        TreeStateRepo::find_edit_by_name(&self.pool, ctx.app_id, state_type.id(), name)
            .await?
            .ok_or_else(|| not_found(name))
    }
}

fn ensure_tree_type(state_type: StateType) -> StateResult<()> {
    if state_type.family() != StateFamily::Tree {
        return Err(CoreError::Validation(format!(
            "State type {state_type:?} is not a tree state"
        ))
        .into());
    }
    Ok(())
}

fn not_found(name: &str) -> StateError {
    CoreError::NotFoundByName {
        entity: ENTITY,
        name: name.to_string(),
    }
    .into()
}

fn find_by_name<'a>(rows: &'a [TreeState], name: &str) -> StateResult<&'a TreeState> {
    rows.iter()
        .find(|r| r.node_name() == name)
        .ok_or_else(|| not_found(name))
}

/// Map a parent display name to a row id. An empty name means the summit
/// position (parent id 0).
async fn resolve_parent_id(
    conn: &mut PgConnection,
    ctx: &EditContext,
    state_type: StateType,
    parent_name: &str,
) -> StateResult<DbId> {
    if parent_name.is_empty() {
        return Ok(SUMMIT_PARENT_ID);
    }
    TreeStateRepo::find_edit_by_name(&mut *conn, ctx.app_id, state_type.id(), parent_name)
        .await?
        .map(|row| row.id)
        .ok_or_else(|| not_found(parent_name))
}

/// Insert `tree` breadth-first under `parent_id` and link it in.
///
/// Rows are created with empty children lists; each node's children list is
/// written once all its children exist. The subtree top is appended to the
/// parent's children, or inserted at `position` when given.
async fn insert_subtree(
    conn: &mut PgConnection,
    ctx: &EditContext,
    state_type: StateType,
    parent_id: DbId,
    tree: &ComponentNode,
    position: Option<usize>,
) -> StateResult<DbId> {
    for name in tree.subtree_display_names() {
        validate_display_name(&name)?;
    }

    let parent = if parent_id == SUMMIT_PARENT_ID {
        let summit =
            TreeStateRepo::find_summit(&mut *conn, ctx.app_id, EDIT_VERSION, state_type.id())
                .await?;
        if let Some(summit) = summit {
            return Err(CoreError::Conflict(format!(
                "Tree already has a summit '{}'",
                summit.name
            ))
            .into());
        }
        None
    } else {
        let parent = TreeStateRepo::find_by_id(&mut *conn, ctx.app_id, parent_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY,
                id: parent_id,
            })?;
        if parent.version != EDIT_VERSION || parent.state_type != state_type.id() {
            return Err(CoreError::Validation(format!(
                "Parent {parent_id} is not an editable {state_type:?} node"
            ))
            .into());
        }
        Some(parent)
    };

    let mut top_id = None;
    let mut children_of: HashMap<DbId, Vec<DbId>> = HashMap::new();
    let mut queue = VecDeque::from([(parent_id, tree)]);

    while let Some((pid, node)) = queue.pop_front() {
        let input = CreateTreeState {
            team_id: ctx.team_id,
            app_ref_id: ctx.app_id,
            state_type: state_type.id(),
            version: EDIT_VERSION,
            parent_node_ref_id: pid,
            children_node_ref_ids: Vec::new(),
            name: node.display_name.clone(),
            content: node.to_content()?,
            user_id: ctx.user_id,
        };
        let created = TreeStateRepo::create(&mut *conn, &input).await?;
        if top_id.is_none() {
            top_id = Some(created.id);
        } else {
            children_of.entry(pid).or_default().push(created.id);
        }
        for child in &node.children_node {
            queue.push_back((created.id, child));
        }
    }

    for (id, children) in &children_of {
        TreeStateRepo::update_children(&mut *conn, *id, children, ctx.user_id).await?;
    }

    let top_id = top_id.ok_or_else(|| CoreError::Internal("Empty subtree insert".into()))?;
    if let Some(parent) = parent {
        let mut children = parent.children_node_ref_ids.0.clone();
        match position {
            Some(position) => attach_child_at(&mut children, top_id, position),
            None => attach_child(&mut children, top_id),
        }
        TreeStateRepo::update_children(&mut *conn, parent.id, &children, ctx.user_id).await?;
    }
    Ok(top_id)
}
