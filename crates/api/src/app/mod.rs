//! HTTP application wiring (axum router + service wiring).
//!
//! - `services.rs`: store selection, service wiring and startup seeding
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and header mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppState, build_state};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: Arc<AppState>) -> Router {
    let auth_state = middleware::AuthState {
        authenticator: state.services.authenticator.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::router().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new().merge(routes::public_router()).merge(protected).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                state.request_timeout,
                middleware::request_scope,
            ))
            .layer(Extension(state)),
    )
}
