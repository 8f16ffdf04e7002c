use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use tokio_util::sync::CancellationToken;

use warden_auth::actions::builtin;
use warden_auth::{NewRole, RolePatch};
use warden_core::{ActionId, RoleId};
use warden_infra::QueryRequest;

use crate::app::errors::ApiResult;
use crate::app::services::AppState;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).patch(update_role))
        .route("/:id/actions/:action_id", put(grant_action).delete(revoke_action))
}

/// POST /roles
pub async fn create_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<NewRole>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ROLES_WRITE)?;
    let role = state.services.roles.create(body, &cancel).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /roles?name=audit&sort=name
pub async fn list_roles(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ROLES_READ)?;
    let request = QueryRequest::from_pairs(params)?;
    Ok(Json(state.services.roles.query(&request, &cancel).await?))
}

/// GET /roles/:id
pub async fn get_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ROLES_READ)?;
    let id: RoleId = id.parse()?;
    Ok(Json(state.services.roles.get(id, &cancel).await?))
}

/// PATCH /roles/:id - `{"active": false}` deactivates without deleting
pub async fn update_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path(id): Path<String>,
    Json(body): Json<RolePatch>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::ROLES_WRITE)?;
    let id: RoleId = id.parse()?;
    Ok(Json(state.services.roles.update(id, body, &cancel).await?))
}

/// PUT /roles/:id/actions/:action_id
pub async fn grant_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path((id, action_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::GRANTS_WRITE)?;
    let (id, action_id): (RoleId, ActionId) = (id.parse()?, action_id.parse()?);
    let grant = state.services.grants.grant_role_action(id, action_id, &cancel).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// DELETE /roles/:id/actions/:action_id
pub async fn revoke_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path((id, action_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, builtin::GRANTS_WRITE)?;
    let (id, action_id): (RoleId, ActionId) = (id.parse()?, action_id.parse()?);
    state.services.grants.revoke_role_action(id, action_id, &cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}
