use warden_auth::TokenClaims;
use warden_core::UserId;

/// Authenticated caller of a request, taken verbatim from the verified
/// token. Permissions are not re-read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: TokenClaims,
}

impl PrincipalContext {
    pub fn new(claims: TokenClaims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> UserId {
        self.claims.sub
    }

    pub fn username(&self) -> &str {
        &self.claims.aud
    }

    pub fn actions(&self) -> &[String] {
        &self.claims.actions
    }

    pub fn roles(&self) -> &[String] {
        &self.claims.roles
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }
}
