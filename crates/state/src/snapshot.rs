//! Release, snapshot, and recover.
//!
//! Publishing always follows the same shape inside one transaction: lock the
//! app row, bump the mainline counter, copy the edit version to the new
//! mainline, then archive the edit-version snapshot at that version and open
//! a fresh one. Exactly one edit-version snapshot exists per app before and
//! after every operation here.

use canopy_core::error::CoreError;
use canopy_core::history::{push_modify_history, AppModifyHistory, SnapshotTriggerMode};
use canopy_core::pagination::{clamp_limit, page_count, page_offset};
use canopy_core::signal::{Signal, Target};
use canopy_core::types::{DbId, Version};
use canopy_core::version::EDIT_VERSION;
use canopy_db::models::app::App;
use canopy_db::models::app_snapshot::AppSnapshot;
use canopy_db::repositories::{AppRepo, AppSnapshotRepo};
use canopy_db::DbPool;
use serde::Serialize;
use sqlx::PgConnection;

use crate::context::EditContext;
use crate::copy::{copy_version, delete_version};
use crate::error::StateResult;

/// One page of archived snapshots, newest version first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPage {
    pub snapshot_list: Vec<AppSnapshot>,
    pub total_pages: i64,
    pub total: i64,
}

/// Result of a recover: the refreshed app and its new edit-version snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverOutcome {
    pub app: App,
    /// Auto snapshot holding the edit version as it was before recovery.
    pub preserved: AppSnapshot,
    pub edit_snapshot: AppSnapshot,
}

#[derive(Clone)]
pub struct SnapshotService {
    pool: DbPool,
}

impl SnapshotService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Publish the edit version as a new release.
    ///
    /// `public`, when given, sets the app's public flag in the same update.
    pub async fn release(
        &self,
        team_id: DbId,
        app_id: DbId,
        user_id: DbId,
        public: Option<bool>,
    ) -> StateResult<App> {
        let mut tx = self.pool.begin().await?;
        let app = publish(&mut tx, team_id, app_id, user_id, true, public).await?;
        rotate_edit_snapshot(
            &mut tx,
            team_id,
            app_id,
            app.mainline_version,
            SnapshotTriggerMode::Auto,
            None,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            team_id,
            app_id,
            release_version = app.release_version,
            public = app.is_public(),
            "App released"
        );
        Ok(app)
    }

    /// Archive the edit version at a new mainline version without releasing
    /// it. Returns the archived snapshot.
    pub async fn take_snapshot(
        &self,
        team_id: DbId,
        app_id: DbId,
        user_id: DbId,
    ) -> StateResult<AppSnapshot> {
        let mut tx = self.pool.begin().await?;
        let app = publish(&mut tx, team_id, app_id, user_id, false, None).await?;
        let record = AppModifyHistory::new(
            Signal::TakeAppSnapshot.code(),
            Target::Apps.code(),
            app.name.clone(),
            user_id,
        );
        let archived = rotate_edit_snapshot(
            &mut tx,
            team_id,
            app_id,
            app.mainline_version,
            SnapshotTriggerMode::Manual,
            Some(record),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            team_id,
            app_id,
            snapshot_id = archived.id,
            target_version = archived.target_version,
            "Snapshot taken"
        );
        Ok(archived)
    }

    /// Replace the edit version with the version archived by `snapshot_id`.
    ///
    /// The current edit version is first preserved as an auto snapshot, so a
    /// recover can itself be undone.
    pub async fn recover(
        &self,
        team_id: DbId,
        app_id: DbId,
        user_id: DbId,
        snapshot_id: DbId,
    ) -> StateResult<RecoverOutcome> {
        let mut tx = self.pool.begin().await?;

        let current = lock_app(&mut tx, team_id, app_id).await?;
        let snapshot = AppSnapshotRepo::find_by_id(&mut *tx, app_id, snapshot_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "app_snapshot",
                id: snapshot_id,
            })?;
        let target = snapshot.target_version;
        validate_recover_target(target, current.mainline_version)?;

        let app = publish(&mut tx, team_id, app_id, user_id, false, None).await?;
        let preserved = rotate_edit_snapshot(
            &mut tx,
            team_id,
            app_id,
            app.mainline_version,
            SnapshotTriggerMode::Auto,
            None,
        )
        .await?;

        delete_version(&mut tx, app_id, EDIT_VERSION).await?;
        copy_version(&mut tx, app_id, target, EDIT_VERSION, user_id).await?;

        let record = AppModifyHistory::new(
            Signal::RecoverAppSnapshot.code(),
            Target::Apps.code(),
            app.name.clone(),
            user_id,
        );
        let edit_snapshot = append_history(&mut tx, team_id, app_id, vec![record]).await?;
        tx.commit().await?;

        tracing::info!(
            team_id,
            app_id,
            snapshot_id,
            recovered_version = target,
            preserved_version = preserved.target_version,
            "Edit version recovered"
        );
        Ok(RecoverOutcome {
            app,
            preserved,
            edit_snapshot,
        })
    }

    /// Archived snapshots of an app. `page` is 1-based.
    pub async fn list_snapshots(
        &self,
        team_id: DbId,
        app_id: DbId,
        limit: Option<i64>,
        page: i64,
    ) -> StateResult<SnapshotPage> {
        ensure_app(&self.pool, team_id, app_id).await?;
        let limit = clamp_limit(limit);
        let offset = page_offset(page, limit);
        let snapshot_list =
            AppSnapshotRepo::list_archived(&self.pool, app_id, limit, offset).await?;
        let total = AppSnapshotRepo::count_archived(&self.pool, app_id).await?;
        Ok(SnapshotPage {
            snapshot_list,
            total_pages: page_count(total, limit),
            total,
        })
    }

    pub async fn get_snapshot(
        &self,
        team_id: DbId,
        app_id: DbId,
        snapshot_id: DbId,
    ) -> StateResult<AppSnapshot> {
        ensure_app(&self.pool, team_id, app_id).await?;
        AppSnapshotRepo::find_by_id(&self.pool, app_id, snapshot_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "app_snapshot",
                    id: snapshot_id,
                }
                .into()
            })
    }

    /// The current edit-version snapshot of an app.
    pub async fn get_edit_snapshot(&self, app_id: DbId) -> StateResult<Option<AppSnapshot>> {
        Ok(AppSnapshotRepo::find_edit(&self.pool, app_id).await?)
    }

    /// Append realtime edit records to the edit-version snapshot.
    ///
    /// Records are pushed in order, so the last one ends up newest.
    pub async fn record_modify_history(
        &self,
        ctx: &EditContext,
        records: Vec<AppModifyHistory>,
    ) -> StateResult<AppSnapshot> {
        let mut tx = self.pool.begin().await?;
        let snapshot = append_history(&mut tx, ctx.team_id, ctx.app_id, records).await?;
        tx.commit().await?;
        Ok(snapshot)
    }
}

fn validate_recover_target(target: Version, mainline_version: Version) -> Result<(), CoreError> {
    if target == EDIT_VERSION {
        return Err(CoreError::Validation(
            "Cannot recover from the edit-version snapshot".into(),
        ));
    }
    if target < 0 || target > mainline_version {
        return Err(CoreError::Validation(format!(
            "Snapshot version {target} is outside the published range 1..={mainline_version}"
        )));
    }
    Ok(())
}

async fn ensure_app(pool: &DbPool, team_id: DbId, app_id: DbId) -> StateResult<()> {
    AppRepo::find_by_id(pool, team_id, app_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| CoreError::NotFound { entity: "app", id: app_id }.into())
}

async fn lock_app(conn: &mut PgConnection, team_id: DbId, app_id: DbId) -> StateResult<App> {
    AppRepo::find_by_id_for_update(&mut *conn, team_id, app_id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "app", id: app_id }.into())
}

/// Lock the app, bump its mainline version, and copy the edit version there.
async fn publish(
    conn: &mut PgConnection,
    team_id: DbId,
    app_id: DbId,
    user_id: DbId,
    release: bool,
    public: Option<bool>,
) -> StateResult<App> {
    lock_app(conn, team_id, app_id).await?;
    let app = AppRepo::bump_mainline(&mut *conn, team_id, app_id, release, public, user_id)
        .await?
        .ok_or(CoreError::NotFound { entity: "app", id: app_id })?;
    copy_version(conn, app_id, EDIT_VERSION, app.mainline_version, user_id).await?;
    Ok(app)
}

/// Archive the edit-version snapshot at `target_version` and open a new,
/// empty one. Returns the archived snapshot.
async fn rotate_edit_snapshot(
    conn: &mut PgConnection,
    team_id: DbId,
    app_id: DbId,
    target_version: Version,
    trigger_mode: SnapshotTriggerMode,
    record: Option<AppModifyHistory>,
) -> StateResult<AppSnapshot> {
    let archived = match AppSnapshotRepo::find_edit_for_update(&mut *conn, app_id).await? {
        Some(edit) => {
            let mut history = edit.modify_history.0;
            if let Some(record) = record {
                push_modify_history(&mut history, record);
            }
            AppSnapshotRepo::archive(
                &mut *conn,
                edit.id,
                target_version,
                trigger_mode.id(),
                &history,
            )
            .await?
            .ok_or(CoreError::NotFound {
                entity: "app_snapshot",
                id: edit.id,
            })?
        }
        None => {
            let history: Vec<_> = record.into_iter().collect();
            AppSnapshotRepo::create(
                &mut *conn,
                team_id,
                app_id,
                target_version,
                trigger_mode.id(),
                &history,
            )
            .await?
        }
    };

    AppSnapshotRepo::create(
        &mut *conn,
        team_id,
        app_id,
        EDIT_VERSION,
        SnapshotTriggerMode::Auto.id(),
        &[],
    )
    .await?;
    Ok(archived)
}

/// Push `records` onto the edit-version snapshot, creating it if missing.
async fn append_history(
    conn: &mut PgConnection,
    team_id: DbId,
    app_id: DbId,
    records: Vec<AppModifyHistory>,
) -> StateResult<AppSnapshot> {
    let mut snapshot = match AppSnapshotRepo::find_edit_for_update(&mut *conn, app_id).await? {
        Some(snapshot) => snapshot,
        None => {
            AppSnapshotRepo::create(
                &mut *conn,
                team_id,
                app_id,
                EDIT_VERSION,
                SnapshotTriggerMode::Auto.id(),
                &[],
            )
            .await?
        }
    };
    for record in records {
        push_modify_history(&mut snapshot.modify_history.0, record);
    }
    AppSnapshotRepo::update_history(&mut *conn, snapshot.id, &snapshot.modify_history.0).await?;
    Ok(snapshot)
}
