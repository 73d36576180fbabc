//! Integration tests for the component tree service.
//!
//! Exercises recursive create, move, delete, upsert, and put against a real
//! database, checking the rebuilt tree after each mutation.

mod common;

use assert_matches::assert_matches;
use canopy_core::error::CoreError;
use canopy_core::state_type::StateType;
use canopy_core::version::EDIT_VERSION;
use canopy_db::repositories::TreeStateRepo;
use canopy_state::StateError;
use common::{chain, child_names, container, new_app, widget};
use sqlx::PgPool;

const COMPONENTS: StateType = StateType::Components;

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn new_app_has_only_the_summit(pool: PgPool) {
    let (services, app, _ctx) = new_app(&pool, "blank").await;

    let tree = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.display_name, "root");
    assert!(tree.children_node.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_links_new_node_under_named_parent(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "create").await;

    let id = services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &widget("btn1", "root"))
        .await
        .unwrap();

    let root = TreeStateRepo::find_summit(&pool, app.id, EDIT_VERSION, COMPONENTS.id())
        .await
        .unwrap()
        .unwrap();
    let btn = TreeStateRepo::find_by_id(&pool, app.id, id).await.unwrap().unwrap();
    assert_eq!(btn.name, "btn1");
    assert_eq!(btn.parent_node_ref_id, root.id);
    assert_eq!(root.children_node_ref_ids.0, vec![id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn nested_subtree_round_trips_through_rows(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "nested").await;
    let form = container(
        "form1",
        "root",
        vec![
            widget("input1", "form1"),
            container("box1", "form1", vec![widget("btn2", "box1")]),
            widget("input2", "form1"),
        ],
    );

    services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &form)
        .await
        .unwrap();

    let tree = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child_names(&tree), vec!["form1"]);
    assert_eq!(tree.children_node[0], form);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_name_is_a_conflict(pool: PgPool) {
    let (services, _app, ctx) = new_app(&pool, "dup").await;
    services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &widget("btn1", "root"))
        .await
        .unwrap();

    let err = services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &widget("btn1", "root"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_summit_is_rejected(pool: PgPool) {
    let (services, _app, ctx) = new_app(&pool, "summit").await;
    let err = services
        .tree
        .create_component_tree(&ctx, COMPONENTS, 0, &widget("root2", ""))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_under_missing_parent_is_not_found(pool: PgPool) {
    let (services, _app, ctx) = new_app(&pool, "orphan").await;
    let err = services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &widget("btn1", "nowhere"))
        .await
        .unwrap_err();
    assert_matches!(err, StateError::Core(CoreError::NotFoundByName { .. }));
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn move_relinks_old_and_new_parent(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "move").await;
    for node in [container("box1", "root", vec![]), widget("btn1", "root")] {
        services
            .tree
            .create_component_tree_by_parent_name(&ctx, COMPONENTS, &node)
            .await
            .unwrap();
    }

    let mut moved = widget("btn1", "box1");
    moved.props.insert("x".into(), serde_json::json!(99));
    services
        .tree
        .move_tree_state_node(&ctx, COMPONENTS, &moved)
        .await
        .unwrap();

    let tree = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child_names(&tree), vec!["box1"]);
    assert_eq!(child_names(&tree.children_node[0]), vec!["btn1"]);
    assert_eq!(tree.children_node[0].children_node[0].props["x"], 99);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn move_under_itself_fails_and_leaves_tree_unchanged(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "selfmove").await;
    services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &widget("btn1", "root"))
        .await
        .unwrap();
    let before = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap();

    let err = services
        .tree
        .move_tree_state_node(&ctx, COMPONENTS, &widget("btn1", "btn1"))
        .await
        .unwrap_err();
    assert_matches!(err, StateError::Core(CoreError::Validation(_)));

    let after = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap();
    assert_eq!(before, after);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn move_under_descendant_is_rejected(pool: PgPool) {
    let (services, _app, ctx) = new_app(&pool, "cycle").await;
    services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &chain(3))
        .await
        .unwrap();

    let err = services
        .tree
        .move_tree_state_node(&ctx, COMPONENTS, &container("level1", "level3", vec![]))
        .await
        .unwrap_err();
    assert_matches!(err, StateError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn recursive_delete_removes_twenty_levels(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "deep").await;
    services
        .tree
        .create_component_tree_by_parent_name(&ctx, COMPONENTS, &chain(20))
        .await
        .unwrap();
    let rows = TreeStateRepo::list_by_app_version_type(&pool, app.id, EDIT_VERSION, COMPONENTS.id())
        .await
        .unwrap();
    assert_eq!(rows.len(), 21);

    let deleted = services
        .tree
        .delete_tree_state_node_recursive(&ctx, COMPONENTS, "level1")
        .await
        .unwrap();
    assert_eq!(deleted, 20);

    let rows = TreeStateRepo::list_by_app_version_type(&pool, app.id, EDIT_VERSION, COMPONENTS.id())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].children_node_ref_ids.0.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn summit_cannot_be_deleted(pool: PgPool) {
    let (services, _app, ctx) = new_app(&pool, "keeproot").await;
    let err = services
        .tree
        .delete_tree_state_node_recursive(&ctx, COMPONENTS, "root")
        .await
        .unwrap_err();
    assert_matches!(err, StateError::Core(CoreError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Create-or-update and put
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_or_update_twice_keeps_one_row(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "upsert").await;
    let mut node = widget("btn1", "root");

    services.tree.create_or_update(&ctx, COMPONENTS, &node).await.unwrap();
    node.props.insert("text".into(), serde_json::json!("second"));
    services.tree.create_or_update(&ctx, COMPONENTS, &node).await.unwrap();

    let rows = TreeStateRepo::list_by_app_version_type(&pool, app.id, EDIT_VERSION, COMPONENTS.id())
        .await
        .unwrap();
    assert_eq!(rows.iter().filter(|r| r.name == "btn1").count(), 1);

    let tree = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.children_node[0].props["text"], "second");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn put_replaces_subtree_in_place(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "put").await;
    for node in [
        widget("btn1", "root"),
        container("box1", "root", vec![widget("old1", "box1")]),
        widget("btn2", "root"),
    ] {
        services
            .tree
            .create_component_tree_by_parent_name(&ctx, COMPONENTS, &node)
            .await
            .unwrap();
    }

    services
        .tree
        .put(&ctx, COMPONENTS, &container("box1", "root", vec![widget("new1", "box1")]))
        .await
        .unwrap();

    let tree = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child_names(&tree), vec!["btn1", "box1", "btn2"]);
    assert_eq!(child_names(&tree.children_node[1]), vec!["new1"]);
    assert!(services
        .tree
        .get_by_name(app.id, COMPONENTS, "old1")
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Broken rows
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn dangling_child_reference_is_a_broken_tree(pool: PgPool) {
    let (services, app, ctx) = new_app(&pool, "broken").await;
    let root = TreeStateRepo::find_summit(&pool, app.id, EDIT_VERSION, COMPONENTS.id())
        .await
        .unwrap()
        .unwrap();
    TreeStateRepo::update_children(&pool, root.id, &[i64::MAX], ctx.user_id)
        .await
        .unwrap();

    let err = services
        .tree
        .get_tree(app.id, EDIT_VERSION, COMPONENTS)
        .await
        .unwrap_err();
    assert_matches!(err, StateError::Core(CoreError::BrokenTree(_)));
}
