use warden_core::{ServiceError, ServiceResult};

use crate::{TokenClaims, TokenUse};

/// Binary-search membership test over a sorted action list.
///
/// Grants only when the located element is exactly equal to `required`; an
/// insertion point is never treated as a hit.
pub fn holds_action(sorted_actions: &[String], required: &str) -> bool {
    match sorted_actions.binary_search_by(|probe| probe.as_str().cmp(required)) {
        Ok(idx) => sorted_actions[idx] == required,
        Err(_) => false,
    }
}

/// Authorize a request against the presented token's claims.
///
/// - No IO
/// - No panics
/// - Missing claims, refresh tokens and absent actions all deny
pub fn authorize(claims: Option<&TokenClaims>, required: &str) -> bool {
    match claims {
        Some(claims) => claims.token_use == TokenUse::Access && holds_action(&claims.actions, required),
        None => false,
    }
}

/// Like [`authorize`], but reports why the request was denied.
pub fn require_action(claims: Option<&TokenClaims>, required: &str) -> ServiceResult<()> {
    let Some(claims) = claims else {
        return Err(ServiceError::MissingCredential);
    };
    if authorize(Some(claims), required) {
        Ok(())
    } else {
        tracing::debug!(user_id = %claims.sub, action = required, "action not granted");
        Err(ServiceError::PermissionDenied(required.to_string()))
    }
}
