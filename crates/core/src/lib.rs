//! Domain types, constants, and pure algorithms shared by every crate.
//!
//! Nothing in here touches the database or the network. The storage layer,
//! the state services, and the realtime hub all build on these definitions.

pub mod action;
pub mod app_config;
pub mod component;
pub mod error;
pub mod frame;
pub mod history;
pub mod naming;
pub mod pagination;
pub mod presence;
pub mod signal;
pub mod state_type;
pub mod tree;
pub mod types;
pub mod version;
