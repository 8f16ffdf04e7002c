//! HS256 token signing and verification.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use warden_core::{Clock, CredentialFailure, ServiceError, ServiceResult};

use crate::{TokenClaims, TokenUse, validate_claims};

/// Shared-secret key material plus the issuer stamped into every token.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign claims with HS256.
    pub fn sign(&self, claims: &TokenClaims) -> ServiceResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ServiceError::internal(format!("token signing failed: {e}")))
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("issuer", &self.issuer)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Verifies bearer tokens and yields their claims.
///
/// The algorithm is pinned to HS256; a token whose header names any other
/// algorithm is rejected before its claims are looked at. Time checks use the
/// injected clock rather than the library's wall clock.
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    keys: Arc<TokenKeys>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthenticator {
    pub fn new(keys: Arc<TokenKeys>, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    pub fn authenticate(&self, token: &str) -> ServiceResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_issuer(&[self.keys.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims = jsonwebtoken::decode::<TokenClaims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let failure = classify(e.kind());
                tracing::debug!(reason = %failure, "token rejected");
                ServiceError::invalid_credential(failure)
            })?;

        if let Err(failure) = validate_claims(&claims, self.clock.now()) {
            tracing::debug!(user_id = %claims.sub, reason = %failure, "token claims rejected");
            return Err(ServiceError::invalid_credential(failure));
        }
        if claims.token_use != TokenUse::Access {
            tracing::debug!(user_id = %claims.sub, "refresh token presented as bearer");
            return Err(ServiceError::invalid_credential(CredentialFailure::Malformed));
        }
        Ok(claims)
    }
}

fn classify(kind: &ErrorKind) -> CredentialFailure {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => CredentialFailure::BadSignature,
        ErrorKind::ExpiredSignature => CredentialFailure::Expired,
        ErrorKind::ImmatureSignature => CredentialFailure::NotYetValid,
        _ => CredentialFailure::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use warden_core::{FixedClock, TokenUid, UserId};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn claims(iat: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            jti: TokenUid::new(),
            iss: "warden".to_string(),
            aud: "alice".to_string(),
            sub: UserId::new(),
            iat,
            exp,
            token_use: TokenUse::Access,
            actions: vec!["roles.read".to_string(), "users.read".to_string()],
            roles: vec!["viewer".to_string()],
        }
    }

    fn authenticator(clock: Arc<FixedClock>) -> (Arc<TokenKeys>, TokenAuthenticator) {
        let keys = Arc::new(TokenKeys::from_secret(SECRET, "warden"));
        let auth = TokenAuthenticator::new(keys.clone(), clock);
        (keys, auth)
    }

    #[test]
    fn sign_then_authenticate() {
        let now = Utc::now();
        let clock = Arc::new(FixedClock::new(now));
        let (keys, auth) = authenticator(clock);
        let c = claims(now.timestamp(), now.timestamp() + 900);

        let token = keys.sign(&c).unwrap();
        assert_eq!(auth.authenticate(&token).unwrap(), c);
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let now = Utc::now();
        let (_, auth) = authenticator(Arc::new(FixedClock::new(now)));
        let c = claims(now.timestamp(), now.timestamp() + 900);

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &c,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(
            auth.authenticate(&token),
            Err(ServiceError::InvalidCredential(CredentialFailure::BadSignature))
        );
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let now = Utc::now();
        let (_, auth) = authenticator(Arc::new(FixedClock::new(now)));
        let forged = TokenKeys::from_secret(b"another-secret-another-secret-!!", "warden");
        let token = forged.sign(&claims(now.timestamp(), now.timestamp() + 900)).unwrap();

        assert_eq!(
            auth.authenticate(&token),
            Err(ServiceError::InvalidCredential(CredentialFailure::BadSignature))
        );
    }

    #[test]
    fn expiry_follows_the_injected_clock() {
        let now = Utc::now();
        let clock = Arc::new(FixedClock::new(now));
        let (keys, auth) = authenticator(clock.clone());
        let token = keys.sign(&claims(now.timestamp(), now.timestamp() + 60)).unwrap();

        assert!(auth.authenticate(&token).is_ok());
        clock.advance(Duration::seconds(61));
        assert_eq!(
            auth.authenticate(&token),
            Err(ServiceError::InvalidCredential(CredentialFailure::Expired))
        );
    }

    #[test]
    fn garbage_and_refresh_tokens_are_malformed() {
        let now = Utc::now();
        let (keys, auth) = authenticator(Arc::new(FixedClock::new(now)));
        assert_eq!(
            auth.authenticate("not.a.token"),
            Err(ServiceError::InvalidCredential(CredentialFailure::Malformed))
        );

        let mut c = claims(now.timestamp(), now.timestamp() + 60);
        c.token_use = TokenUse::Refresh;
        c.actions.clear();
        c.roles.clear();
        let token = keys.sign(&c).unwrap();
        assert_eq!(
            auth.authenticate(&token),
            Err(ServiceError::InvalidCredential(CredentialFailure::Malformed))
        );
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let now = Utc::now();
        let (_, auth) = authenticator(Arc::new(FixedClock::new(now)));
        let other = TokenKeys::from_secret(SECRET, "someone-else");
        let mut c = claims(now.timestamp(), now.timestamp() + 60);
        c.iss = "someone-else".to_string();
        let token = other.sign(&c).unwrap();

        assert!(auth.authenticate(&token).is_err());
    }

    #[test]
    fn debug_output_hides_secret() {
        let keys = TokenKeys::from_secret(SECRET, "warden");
        let out = format!("{keys:?}");
        assert!(out.contains("<redacted>"));
        assert!(!out.contains("0123456789abcdef"));
    }
}
