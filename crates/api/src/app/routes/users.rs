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
use warden_auth::{NewUser, UserPatch};
use warden_core::{ActionId, RoleId, UserId};
use warden_infra::QueryRequest;

use crate::app::errors::ApiResult;
use crate::app::services::AppState;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user))
        .route("/:id/roles/:role_id", put(assign_role).delete(revoke_role))
        .route("/:id/actions/:action_id", put(grant_action).delete(revoke_action))
}

/// POST /users
pub async fn create_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Json(body): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::USERS_WRITE)?;
    let user = state.services.users.create(body, &cancel).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users?username=ali&active=true&sort=-created_at&page=2&per_page=10
pub async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::USERS_READ)?;
    let request = QueryRequest::from_pairs(params)?;
    let page = state.services.users.query(&request, &cancel).await?;
    Ok(Json(page))
}

/// GET /users/:id
pub async fn get_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::USERS_READ)?;
    let id: UserId = id.parse()?;
    Ok(Json(state.services.users.get(id, &cancel).await?))
}

/// PATCH /users/:id
pub async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path(id): Path<String>,
    Json(body): Json<UserPatch>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::USERS_WRITE)?;
    let id: UserId = id.parse()?;
    Ok(Json(state.services.users.update(id, body, &cancel).await?))
}

/// PUT /users/:id/roles/:role_id
pub async fn assign_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path((id, role_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::GRANTS_WRITE)?;
    let (id, role_id): (UserId, RoleId) = (id.parse()?, role_id.parse()?);
    let grant = state.services.grants.assign_role(id, role_id, &cancel).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// DELETE /users/:id/roles/:role_id
pub async fn revoke_role(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path((id, role_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, builtin::GRANTS_WRITE)?;
    let (id, role_id): (UserId, RoleId) = (id.parse()?, role_id.parse()?);
    state.services.grants.revoke_role(id, role_id, &cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /users/:id/actions/:action_id
pub async fn grant_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path((id, action_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&principal, builtin::GRANTS_WRITE)?;
    let (id, action_id): (UserId, ActionId) = (id.parse()?, action_id.parse()?);
    let grant = state.services.grants.grant_user_action(id, action_id, &cancel).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// DELETE /users/:id/actions/:action_id
pub async fn revoke_action(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Extension(cancel): Extension<CancellationToken>,
    Path((id, action_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, builtin::GRANTS_WRITE)?;
    let (id, action_id): (UserId, ActionId) = (id.parse()?, action_id.parse()?);
    state.services.grants.revoke_user_action(id, action_id, &cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}
