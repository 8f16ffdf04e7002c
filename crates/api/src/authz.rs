//! Per-route action guard.
//!
//! Runs before any service call so a denied request never touches storage.

use warden_auth::require_action;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Fail with 403 unless the caller's token carries `action`.
pub fn require(principal: &PrincipalContext, action: &str) -> Result<(), ApiError> {
    require_action(Some(principal.claims()), action).map_err(|err| {
        tracing::debug!(user_id = %principal.user_id(), action, "request denied");
        ApiError::from(err)
    })
}
