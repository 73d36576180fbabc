pub mod action;
pub mod app;
pub mod app_snapshot;
pub mod kv_state;
pub mod set_state;
pub mod tree_state;
