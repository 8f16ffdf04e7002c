use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::app::dto::{request_metadata, LoginRequest, LoginResponse, MeResponse};
use crate::app::errors::ApiResult;
use crate::app::services::AppState;
use crate::context::PrincipalContext;

/// POST /auth/login - Exchange username and password for a token
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Extension(cancel): Extension<CancellationToken>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let metadata = request_metadata(&headers, peer.map(|ConnectInfo(addr)| addr));
    let issued = state
        .services
        .auth
        .login(&body.username, &body.password, metadata, &cancel)
        .await?;
    Ok(Json(issued.into()))
}

/// GET /me - Echo the caller's verified claims
pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Json<MeResponse> {
    Json(MeResponse::from(&principal))
}
