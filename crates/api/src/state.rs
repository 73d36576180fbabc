use std::sync::Arc;

use canopy_state::StateServices;

use crate::config::ServerConfig;
use crate::trust::TrustService;
use crate::ws::HubHandle;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is an `Arc`, a pool, or a channel handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: canopy_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// State services shared with the realtime hub.
    pub services: StateServices,
    /// Handle to the realtime hub task.
    pub hub: HubHandle,
    pub trust: Arc<dyn TrustService>,
}
