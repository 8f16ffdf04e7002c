use axum::{
    routing::{get, post},
    Router,
};

pub mod actions;
pub mod auth;
pub mod roles;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(auth::me))
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/actions", actions::router())
}

/// Routes reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
}
