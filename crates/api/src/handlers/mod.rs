//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers delegate to the state services in `canopy_state` and map errors
//! via [`AppError`](crate::error::AppError).

pub mod action;
pub mod app;
pub mod snapshot;
