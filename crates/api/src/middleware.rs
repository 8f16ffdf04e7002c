use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tokio_util::sync::CancellationToken;

use warden_auth::TokenAuthenticator;
use warden_core::{CredentialFailure, ServiceError};
use warden_infra::CancelScope;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub authenticator: TokenAuthenticator,
}

/// Verify the bearer token and attach the caller's [`PrincipalContext`].
///
/// Every failure produces the same 401 body; the sub-kind is only logged.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.authenticator.authenticate(token).map_err(|err| {
        match &err {
            ServiceError::InvalidCredential(CredentialFailure::BadSignature) => {
                tracing::warn!(reason = %err, "bearer token rejected")
            }
            _ => tracing::debug!(reason = %err, "bearer token rejected"),
        }
        ApiError::from(err)
    })?;

    req.extensions_mut().insert(PrincipalContext::new(claims));
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ServiceError::MissingCredential)?;

    let header = header
        .to_str()
        .map_err(|_| ServiceError::InvalidCredential(CredentialFailure::Malformed))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ServiceError::InvalidCredential(CredentialFailure::Malformed))?
        .trim();
    if token.is_empty() {
        return Err(ServiceError::MissingCredential.into());
    }

    Ok(token)
}

/// Give each request a cancellation token that trips after `timeout`.
///
/// The timer is dropped with the scope once the response is produced.
pub async fn request_scope(State(timeout): State<Duration>, mut req: Request, next: Next) -> Response {
    let scope = CancelScope::start(timeout);
    req.extensions_mut().insert::<CancellationToken>(scope.token().clone());
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_is_extracted_and_trimmed() {
        let headers = headers("Bearer  abc.def.ghi ");
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn other_schemes_and_empty_tokens_fail() {
        assert!(extract_bearer(&HeaderMap::new()).is_err());
        assert!(extract_bearer(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(extract_bearer(&headers("Bearer ")).is_err());
    }
}
