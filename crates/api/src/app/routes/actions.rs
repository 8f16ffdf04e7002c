use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio_util::sync::CancellationToken;

use warden_auth::actions::builtin;
use warden_auth::{ActionPatch, NewAction};
use warden_core::ActionId;
use warden_infra::QueryRequest;

use crate::app::errors::ApiResult;
use crate::app::services::AppState;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_actions).post(create_action))
        .route("/:id", get(get_action).patch(update_action))
}

/// POST /actions
pub async fn create_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<NewAction>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ACTIONS_WRITE)?;
    let action = state.services.actions.create(body, &cancel).await?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// GET /actions
pub async fn list_actions(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ACTIONS_READ)?;
    let request = QueryRequest::from_pairs(params)?;
    Ok(Json(state.services.actions.query(&request, &cancel).await?))
}

/// GET /actions/:id
pub async fn get_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ACTIONS_READ)?;
    let id: ActionId = id.parse()?;
    Ok(Json(state.services.actions.get(id, &cancel).await?))
}

/// PATCH /actions/:id
pub async fn update_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path(id): Path<String>,
    Json(body): Json<ActionPatch>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ACTIONS_WRITE)?;
    let id: ActionId = id.parse()?;
    Ok(Json(state.services.actions.update(id, body, &cancel).await?))
}
