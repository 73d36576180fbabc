//! State services: the collaborative state machine over the persisted
//! families (component tree, key-value, set, actions) plus apps and the
//! snapshot/release engine.
//!
//! Every service is a cheap `Clone` handle over the connection pool.
//! Realtime mutations always target the edit version; publication copies
//! the edit version to a fresh mainline version.

pub mod action;
pub mod app;
pub mod context;
pub mod copy;
pub mod error;
pub mod kv;
pub mod payload;
pub mod set;
pub mod snapshot;
pub mod tree;

use canopy_db::DbPool;

pub use context::EditContext;
pub use error::{StateError, StateResult};

/// All state services, constructed once at startup and shared by the HTTP
/// handlers and the realtime hub.
#[derive(Clone)]
pub struct StateServices {
    pub apps: app::AppService,
    pub actions: action::ActionService,
    pub tree: tree::TreeStateService,
    pub kv: kv::KvStateService,
    pub set: set::SetStateService,
    pub snapshots: snapshot::SnapshotService,
}

impl StateServices {
    pub fn new(pool: DbPool) -> Self {
        Self {
            apps: app::AppService::new(pool.clone()),
            actions: action::ActionService::new(pool.clone()),
            tree: tree::TreeStateService::new(pool.clone()),
            kv: kv::KvStateService::new(pool.clone()),
            set: set::SetStateService::new(pool.clone()),
            snapshots: snapshot::SnapshotService::new(pool),
        }
    }
}
