//! Canopy API server library.
//!
//! Exposes the HTTP routes, the realtime hub, and the trust service client so
//! integration tests and the binary entrypoint can both reach them.

pub mod config;
pub mod echo;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod trust;
pub mod ws;
