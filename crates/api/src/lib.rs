//! HTTP API: a thin axum wrapper around the warden services.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
