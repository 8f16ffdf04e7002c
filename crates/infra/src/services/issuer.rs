use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::{EffectivePermissionSet, RequestMetadata, TokenClaims, TokenKeys, TokenRecord, User};
use warden_core::{Clock, ServiceError, ServiceResult, TokenUid};

use crate::cancel::cancellable;
use crate::config::TokenSettings;
use crate::store::TokenStore;

/// Outcome of a successful issuance.
#[derive(Clone)]
pub struct IssuedToken {
    pub uid: TokenUid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub claims: TokenClaims,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("uid", &self.uid)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Signs access (and optionally refresh) tokens and records every issuance.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<TokenKeys>,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    settings: TokenSettings,
}

impl TokenIssuer {
    pub fn new(
        keys: Arc<TokenKeys>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            keys,
            tokens,
            clock,
            settings,
        }
    }

    /// Sign a token embedding `permissions` and persist its record.
    ///
    /// The token is only returned once the record is stored; a storage
    /// failure fails the issuance.
    #[instrument(skip(self, user, permissions, metadata, cancel), fields(user_id = %user.id), err)]
    pub async fn issue(
        &self,
        user: &User,
        permissions: EffectivePermissionSet,
        metadata: RequestMetadata,
        cancel: &CancellationToken,
    ) -> ServiceResult<IssuedToken> {
        let permissions = permissions.normalized();
        // Claims carry whole seconds; the record must agree with them.
        let issued_at = self.clock.now().trunc_subsecs(0);
        let expires_at = issued_at + self.settings.access_ttl;

        let uid = TokenUid::new();
        let claims = TokenClaims::access(uid, self.keys.issuer(), user, issued_at, expires_at, &permissions);
        let access_token = self.keys.sign(&claims)?;

        let refresh_token = if self.settings.issue_refresh_token {
            let refresh = TokenClaims::refresh(
                TokenUid::new(),
                self.keys.issuer(),
                user,
                issued_at,
                issued_at + self.settings.refresh_ttl,
            );
            Some(self.keys.sign(&refresh)?)
        } else {
            None
        };

        let record = TokenRecord {
            uid,
            user_id: user.id,
            access_token: access_token.clone(),
            refresh_token: refresh_token.clone(),
            remote_addr: metadata.remote_addr,
            forwarded_for: metadata.forwarded_for,
            real_ip: metadata.real_ip,
            user_agent: metadata.user_agent,
            created_at: issued_at,
            expired_at: expires_at,
        };
        record.validate()?;
        cancellable(cancel, self.tokens.insert_token(&record)).await?;

        tracing::info!(
            token_uid = %uid,
            actions = claims.actions.len(),
            expires_at = %expires_at,
            refresh = refresh_token.is_some(),
            "token issued"
        );
        Ok(IssuedToken {
            uid,
            access_token,
            refresh_token,
            expires_at,
            claims,
        })
    }

    #[instrument(skip(self, cancel), fields(token_uid = %uid), err)]
    pub async fn record(&self, uid: TokenUid, cancel: &CancellationToken) -> ServiceResult<TokenRecord> {
        cancellable(cancel, self.tokens.token_by_uid(uid))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use warden_auth::{TokenAuthenticator, TokenUse};
    use warden_core::{FixedClock, UserId};

    use crate::store::{InMemoryStore, StoreError, StoreResult};

    fn alice() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            full_name: "Alice".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "x".into(),
            active: true,
            verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn permissions() -> EffectivePermissionSet {
        EffectivePermissionSet {
            actions: vec!["users.write".into(), "users.read".into(), "users.read".into()],
            roles: vec!["admin".into()],
        }
    }

    fn issuer(tokens: Arc<dyn TokenStore>, clock: Arc<FixedClock>, settings: TokenSettings) -> TokenIssuer {
        let keys = Arc::new(TokenKeys::from_secret(b"issuer-test-secret-issuer-test-secret", "warden"));
        TokenIssuer::new(keys, tokens, clock, settings)
    }

    #[tokio::test]
    async fn issues_persisted_verifiable_tokens() {
        let clock = Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2026-03-01T12:00:00.750Z")
                .unwrap()
                .with_timezone(&Utc),
        ));
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer(store.clone(), clock.clone(), TokenSettings::default());
        let cancel = CancellationToken::new();
        let user = alice();

        let issued = issuer
            .issue(&user, permissions(), RequestMetadata::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(issued.claims.actions, vec!["users.read", "users.write"]);
        assert_eq!(issued.claims.aud, "alice");
        assert_eq!(issued.claims.sub, user.id);

        let record = issuer.record(issued.uid, &cancel).await.unwrap();
        assert_eq!(record.access_token, issued.access_token);
        assert_eq!(record.created_at.timestamp(), issued.claims.iat);
        assert_eq!(record.expired_at, issued.expires_at);
        assert_eq!(record.expired_at - record.created_at, TimeDelta::seconds(900));
        assert_eq!(record.created_at.timestamp_subsec_nanos(), 0);

        let authenticator = TokenAuthenticator::new(
            Arc::new(TokenKeys::from_secret(b"issuer-test-secret-issuer-test-secret", "warden")),
            clock,
        );
        assert_eq!(authenticator.authenticate(&issued.access_token).unwrap(), issued.claims);
    }

    #[tokio::test]
    async fn two_issuances_are_distinct() {
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer(store, Arc::new(FixedClock::new(Utc::now())), TokenSettings::default());
        let cancel = CancellationToken::new();
        let user = alice();

        let first = issuer.issue(&user, permissions(), RequestMetadata::default(), &cancel).await.unwrap();
        let second = issuer.issue(&user, permissions(), RequestMetadata::default(), &cancel).await.unwrap();
        assert_ne!(first.uid, second.uid);
        assert_ne!(first.access_token, second.access_token);
        assert!(issuer.record(first.uid, &cancel).await.is_ok());
        assert!(issuer.record(second.uid, &cancel).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_token_is_optional_and_not_an_access_token() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let store = Arc::new(InMemoryStore::new());
        let settings = TokenSettings {
            issue_refresh_token: true,
            ..TokenSettings::default()
        };
        let issuer = issuer(store, clock.clone(), settings);
        let metadata = RequestMetadata {
            remote_addr: Some("10.0.0.7:5151".into()),
            user_agent: Some("curl/8".into()),
            ..Default::default()
        };
        let cancel = CancellationToken::new();

        let issued = issuer.issue(&alice(), permissions(), metadata, &cancel).await.unwrap();
        let refresh = issued.refresh_token.clone().unwrap();
        let record = issuer.record(issued.uid, &cancel).await.unwrap();
        assert_eq!(record.refresh_token.as_deref(), Some(refresh.as_str()));
        assert_eq!(record.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(issued.claims.token_use, TokenUse::Access);

        let authenticator = TokenAuthenticator::new(
            Arc::new(TokenKeys::from_secret(b"issuer-test-secret-issuer-test-secret", "warden")),
            clock,
        );
        assert!(authenticator.authenticate(&refresh).is_err());
        assert!(!format!("{issued:?}").contains(&issued.access_token));
    }

    struct BrokenTokens;

    #[async_trait]
    impl TokenStore for BrokenTokens {
        async fn insert_token(&self, _: &TokenRecord) -> StoreResult<()> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn token_by_uid(&self, _: TokenUid) -> StoreResult<Option<TokenRecord>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn storage_failure_fails_issuance() {
        let issuer = issuer(
            Arc::new(BrokenTokens),
            Arc::new(FixedClock::new(Utc::now())),
            TokenSettings::default(),
        );
        let err = issuer
            .issue(&alice(), permissions(), RequestMetadata::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::StoreFailure("disk full".into()));
    }
}
