//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods.
//! Methods are generic over [`sqlx::PgExecutor`] so the state services can
//! run them against the pool or inside a transaction (`&mut *tx`).

pub mod action_repo;
pub mod app_repo;
pub mod app_snapshot_repo;
pub mod kv_state_repo;
pub mod set_state_repo;
pub mod tree_state_repo;

pub use action_repo::ActionRepo;
pub use app_repo::AppRepo;
pub use app_snapshot_repo::AppSnapshotRepo;
pub use kv_state_repo::KvStateRepo;
pub use set_state_repo::SetStateRepo;
pub use tree_state_repo::TreeStateRepo;
