use std::net::SocketAddr;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_auth::RequestMetadata;
use warden_core::{TokenUid, UserId};
use warden_infra::IssuedToken;

use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token_uid: TokenUid,
    pub token_type: &'static str,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub actions: Vec<String>,
    pub roles: Vec<String>,
}

impl From<IssuedToken> for LoginResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token_uid: issued.uid,
            token_type: "Bearer",
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_at: issued.expires_at,
            actions: issued.claims.actions,
            roles: issued.claims.roles,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
    pub username: String,
    pub actions: Vec<String>,
    pub roles: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<&PrincipalContext> for MeResponse {
    fn from(principal: &PrincipalContext) -> Self {
        let claims = principal.claims();
        Self {
            user_id: principal.user_id(),
            username: principal.username().to_string(),
            actions: principal.actions().to_vec(),
            roles: principal.roles().to_vec(),
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

// -------------------------
// Mapping helpers
// -------------------------

/// Caller details recorded with an issued token.
pub fn request_metadata(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestMetadata {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    RequestMetadata {
        remote_addr: peer.map(|addr| addr.to_string()),
        forwarded_for: header("x-forwarded-for"),
        real_ip: header("x-real-ip"),
        user_agent: header("user-agent"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn metadata_reads_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("warden-cli/1.0"));
        headers.insert("x-real-ip", HeaderValue::from_static("  "));

        let meta = request_metadata(&headers, Some(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(meta.remote_addr.as_deref(), Some("127.0.0.1:4000"));
        assert_eq!(meta.forwarded_for.as_deref(), Some("203.0.113.9, 10.0.0.1"));
        assert_eq!(meta.user_agent.as_deref(), Some("warden-cli/1.0"));
        assert_eq!(meta.real_ip, None);
    }
}
