//! App lifecycle and the full-app export document.

use std::collections::BTreeMap;

use canopy_core::app_config::{push_editor, AppConfig, EditedBy};
use canopy_core::component::ComponentNode;
use canopy_core::error::CoreError;
use canopy_core::history::SnapshotTriggerMode;
use canopy_core::naming::validate_app_name;
use canopy_core::state_type::{StateType, KV_STATE_TYPES};
use canopy_core::tree::SUMMIT_PARENT_ID;
use canopy_core::types::{DbId, Version};
use canopy_core::version::{resolve_version, EDIT_VERSION};
use canopy_db::models::app::{App, CreateApp, UpdateApp};
use canopy_db::models::tree_state::CreateTreeState;
use canopy_db::repositories::{
    AppRepo, AppSnapshotRepo, KvStateRepo, SetStateRepo, TreeStateRepo,
};
use canopy_db::DbPool;
use serde::Serialize;
use serde_json::Value;

use crate::action::{ActionService, ActionView};
use crate::error::StateResult;
use crate::payload::decode_kv_value;
use crate::tree::TreeStateService;

const ENTITY: &str = "app";

/// Everything a client needs to render one version of an app.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppExport {
    pub app_info: App,
    pub version: Version,
    pub actions: Vec<ActionView>,
    pub components: Option<ComponentNode>,
    pub dependencies_state: BTreeMap<String, Value>,
    pub drag_shadow_state: BTreeMap<String, Value>,
    pub dotted_line_square_state: BTreeMap<String, Value>,
    pub display_name_state: Vec<String>,
}

impl AppExport {
    fn kv_collection_mut(&mut self, state_type: StateType) -> Option<&mut BTreeMap<String, Value>> {
        match state_type {
            StateType::Dependencies => Some(&mut self.dependencies_state),
            StateType::DragShadow => Some(&mut self.drag_shadow_state),
            StateType::DottedLineSquare => Some(&mut self.dotted_line_square_state),
            StateType::Components | StateType::DisplayName => None,
        }
    }
}

#[derive(Clone)]
pub struct AppService {
    pool: DbPool,
    tree: TreeStateService,
    actions: ActionService,
}

impl AppService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            tree: TreeStateService::new(pool.clone()),
            actions: ActionService::new(pool.clone()),
            pool,
        }
    }

    /// Create an app together with its summit component and its first
    /// edit-version snapshot.
    pub async fn create_app(
        &self,
        team_id: DbId,
        name: &str,
        config: Option<AppConfig>,
        user_id: DbId,
    ) -> StateResult<App> {
        validate_app_name(name)?;
        let mut tx = self.pool.begin().await?;

        let app = AppRepo::create(
            &mut *tx,
            &CreateApp {
                team_id,
                name: name.to_string(),
                config: config.unwrap_or_else(AppConfig::new),
                created_by: user_id,
            },
        )
        .await?;

        let summit = ComponentNode::summit();
        TreeStateRepo::create(
            &mut *tx,
            &CreateTreeState {
                team_id,
                app_ref_id: app.id,
                state_type: StateType::Components.id(),
                version: EDIT_VERSION,
                parent_node_ref_id: SUMMIT_PARENT_ID,
                children_node_ref_ids: Vec::new(),
                name: summit.display_name.clone(),
                content: summit.to_content()?,
                user_id,
            },
        )
        .await?;

        AppSnapshotRepo::create(
            &mut *tx,
            team_id,
            app.id,
            EDIT_VERSION,
            SnapshotTriggerMode::Auto.id(),
            &[],
        )
        .await?;

        tx.commit().await?;
        tracing::info!(team_id, app_id = app.id, name = %app.name, "App created");
        Ok(app)
    }

    pub async fn get(&self, team_id: DbId, app_id: DbId) -> StateResult<App> {
        AppRepo::find_by_id(&self.pool, team_id, app_id)
            .await?
            .ok_or_else(|| not_found(app_id))
    }

    /// Look up an app by id alone. Used by the realtime path, where the room
    /// id carries no team.
    pub async fn get_by_app_id(&self, app_id: DbId) -> StateResult<App> {
        AppRepo::find_by_app_id(&self.pool, app_id)
            .await?
            .ok_or_else(|| not_found(app_id))
    }

    /// Apps of a team, most recently edited first.
    pub async fn list(&self, team_id: DbId) -> StateResult<Vec<App>> {
        Ok(AppRepo::list_by_team(&self.pool, team_id).await?)
    }

    pub async fn update(
        &self,
        team_id: DbId,
        app_id: DbId,
        input: &UpdateApp,
        user_id: DbId,
    ) -> StateResult<App> {
        if let Some(name) = &input.name {
            validate_app_name(name)?;
        }
        AppRepo::update(&self.pool, team_id, app_id, input, user_id)
            .await?
            .ok_or_else(|| not_found(app_id))
    }

    pub async fn delete(&self, team_id: DbId, app_id: DbId) -> StateResult<bool> {
        let deleted = AppRepo::delete(&self.pool, team_id, app_id).await?;
        if deleted {
            tracing::info!(team_id, app_id, "App deleted");
        }
        Ok(deleted)
    }

    /// Put `editor` at the front of the app's recent-editors list.
    pub async fn add_editor(&self, app_id: DbId, editor: EditedBy) -> StateResult<()> {
        let app = self.get_by_app_id(app_id).await?;
        let mut edited_by = app.edited_by.0;
        push_editor(&mut edited_by, editor);
        AppRepo::set_edited_by(&self.pool, app_id, &edited_by).await?;
        Ok(())
    }

    /// Record that `user_id` just edited the app.
    pub async fn touch(&self, app_id: DbId, user_id: DbId) -> StateResult<()> {
        AppRepo::touch(&self.pool, app_id, user_id).await?;
        Ok(())
    }

    /// Resolve a requested read version (including the `-1`/`-2` sentinels).
    pub fn resolve_version(app: &App, requested: Version) -> StateResult<Version> {
        Ok(resolve_version(
            requested,
            app.mainline_version,
            app.release_version,
        )?)
    }

    /// Build the export document for one version of an app.
    pub async fn export(
        &self,
        team_id: DbId,
        app_id: DbId,
        requested: Version,
    ) -> StateResult<AppExport> {
        let app = self.get(team_id, app_id).await?;
        self.export_app(app, requested).await
    }

    /// Export the released version of a public app. No team scope applies.
    pub async fn export_public_release(&self, app_id: DbId) -> StateResult<AppExport> {
        let app = self.get_by_app_id(app_id).await?;
        if !app.is_public() {
            return Err(CoreError::Forbidden(format!("App {app_id} is not public")).into());
        }
        let version = app.release_version;
        self.export_app(app, version).await
    }

    async fn export_app(&self, app: App, requested: Version) -> StateResult<AppExport> {
        let version = Self::resolve_version(&app, requested)?;
        let app_id = app.id;

        let components = self
            .tree
            .get_tree(app_id, version, StateType::Components)
            .await?;
        let actions = self.actions.list(app_id, version).await?;

        let mut export = AppExport {
            app_info: app,
            version,
            actions,
            components,
            dependencies_state: BTreeMap::new(),
            drag_shadow_state: BTreeMap::new(),
            dotted_line_square_state: BTreeMap::new(),
            display_name_state: Vec::new(),
        };

        for row in KvStateRepo::list_by_app_version(&self.pool, app_id, version).await? {
            let Ok(state_type) = StateType::try_from(row.state_type) else {
                tracing::warn!(app_id, state_type = row.state_type, "Skipping unknown kv state type");
                continue;
            };
            if !KV_STATE_TYPES.contains(&state_type) {
                continue;
            }
            if let Some(collection) = export.kv_collection_mut(state_type) {
                collection.insert(row.key, decode_kv_value(&row.value));
            }
        }

        export.display_name_state = SetStateRepo::list_by_app_version_type(
            &self.pool,
            app_id,
            version,
            StateType::DisplayName.id(),
        )
        .await?
        .into_iter()
        .map(|row| row.value)
        .collect();

        Ok(export)
    }
}

fn not_found(app_id: DbId) -> crate::StateError {
    CoreError::NotFound {
        entity: ENTITY,
        id: app_id,
    }
    .into()
}
