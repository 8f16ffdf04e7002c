use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{CredentialFailure, TokenUid, UserId};

use crate::{EffectivePermissionSet, User};

/// What a signed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims embedded in (and protected by) a signed token.
///
/// Timestamps are whole Unix seconds, as in any JWT. `actions` and `roles`
/// are sorted and unique; authorization relies on that ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token id; also the audit record primary key.
    pub jti: TokenUid,

    pub iss: String,

    /// Username of the principal.
    pub aud: String,

    /// Principal identifier.
    pub sub: UserId,

    /// Issued-at (Unix seconds).
    pub iat: i64,

    /// Expiration (Unix seconds).
    pub exp: i64,

    pub token_use: TokenUse,

    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Claims for an access token carrying the effective permission set.
    pub fn access(
        jti: TokenUid,
        issuer: &str,
        user: &User,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        permissions: &EffectivePermissionSet,
    ) -> Self {
        Self {
            jti,
            iss: issuer.to_string(),
            aud: user.username.clone(),
            sub: user.id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_use: TokenUse::Access,
            actions: permissions.actions.clone(),
            roles: permissions.roles.clone(),
        }
    }

    /// Claims for a refresh token. Carries no permissions.
    pub fn refresh(
        jti: TokenUid,
        issuer: &str,
        user: &User,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            jti,
            iss: issuer.to_string(),
            aud: user.username.clone(),
            sub: user.id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            token_use: TokenUse::Refresh,
            actions: Vec::new(),
            roles: Vec::new(),
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Deterministically validate token claims against `now`.
///
/// Note: this validates the *claims* only. Signature verification happens in
/// [`crate::TokenAuthenticator`] before this is called.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), CredentialFailure> {
    if claims.exp <= claims.iat {
        return Err(CredentialFailure::Malformed);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(CredentialFailure::NotYetValid);
    }
    if now >= claims.exp {
        return Err(CredentialFailure::Expired);
    }
    if !is_strictly_sorted(&claims.actions) || !is_strictly_sorted(&claims.roles) {
        return Err(CredentialFailure::Malformed);
    }
    Ok(())
}

fn is_strictly_sorted(items: &[String]) -> bool {
    items.windows(2).all(|w| w[0] < w[1])
}
