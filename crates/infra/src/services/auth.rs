use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::{PasswordHasher, RequestMetadata};
use warden_core::{CredentialFailure, ServiceError, ServiceResult};

use super::hashing::{hash_password, verify_password};
use super::issuer::{IssuedToken, TokenIssuer};
use super::resolver::PermissionResolver;
use crate::cancel::cancellable;
use crate::store::UserStore;

/// Username/password login ending in a freshly issued token.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    resolver: PermissionResolver,
    issuer: TokenIssuer,
    decoy_digest: Arc<OnceCell<String>>,
}

const DECOY_PASSWORD: &str = "warden-decoy-password";

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        resolver: PermissionResolver,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            users,
            hasher,
            resolver,
            issuer,
            decoy_digest: Arc::new(OnceCell::new()),
        }
    }

    /// An unknown username and a wrong password fail identically. The
    /// active flag is only consulted once the password checks out.
    #[instrument(skip(self, password, metadata, cancel), err)]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        metadata: RequestMetadata,
        cancel: &CancellationToken,
    ) -> ServiceResult<IssuedToken> {
        let Some(user) = cancellable(cancel, self.users.user_by_username(username)).await? else {
            // Burn one verify so a miss costs as much as a wrong password.
            self.verify_decoy(password, cancel).await?;
            return Err(ServiceError::InvalidCredential(CredentialFailure::BadPassword));
        };

        let verified = cancellable(
            cancel,
            verify_password(self.hasher.clone(), user.password_hash.clone(), password.to_string()),
        )
        .await?;
        if !verified {
            tracing::info!(user_id = %user.id, "login rejected");
            return Err(ServiceError::InvalidCredential(CredentialFailure::BadPassword));
        }
        if !user.active {
            tracing::info!(user_id = %user.id, "login rejected for inactive account");
            return Err(ServiceError::InvalidCredential(CredentialFailure::InactiveAccount));
        }

        let permissions = self.resolver.resolve(user.id, cancel).await?;
        self.issuer.issue(&user, permissions, metadata, cancel).await
    }

    async fn verify_decoy(&self, password: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        let digest = self
            .decoy_digest
            .get_or_try_init(|| hash_password(self.hasher.clone(), DECOY_PASSWORD.to_string()))
            .await?;
        cancellable(
            cancel,
            verify_password(self.hasher.clone(), digest.clone(), password.to_string()),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_auth::{Argon2Hasher, NewUser, TokenKeys, UserPatch};
    use warden_core::SystemClock;

    use crate::config::{QueryConfig, TokenSettings};
    use crate::services::UserService;
    use crate::store::InMemoryStore;

    struct Fixture {
        users: UserService,
        auth: AuthService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::with_params(256, 1).unwrap());
        let clock = Arc::new(SystemClock);
        let keys = Arc::new(TokenKeys::from_secret(b"login-test-secret-login-test-secret", "warden"));
        let issuer = TokenIssuer::new(keys, store.clone(), clock.clone(), TokenSettings::default());
        Fixture {
            users: UserService::new(store.clone(), hasher.clone(), clock, QueryConfig::default().users),
            auth: AuthService::new(store.clone(), hasher, PermissionResolver::new(store), issuer),
        }
    }

    async fn register(fx: &Fixture, active: bool) -> warden_auth::User {
        fx.users
            .create(
                NewUser {
                    full_name: "Linus".into(),
                    username: "linus".into(),
                    email: "linus@example.com".into(),
                    password: "penguins-everywhere".into(),
                    active,
                    verified: true,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn good_password_issues_a_token() {
        let fx = fixture();
        let user = register(&fx, true).await;

        let issued = fx
            .auth
            .login("linus", "penguins-everywhere", RequestMetadata::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(issued.claims.sub, user.id);
        assert!(issued.claims.actions.is_empty());
    }

    #[tokio::test]
    async fn unknown_user_and_bad_password_look_the_same() {
        let fx = fixture();
        register(&fx, true).await;
        let cancel = CancellationToken::new();

        let unknown = fx
            .auth
            .login("nobody", "penguins-everywhere", RequestMetadata::default(), &cancel)
            .await
            .unwrap_err();
        let wrong = fx
            .auth
            .login("linus", "wrong-password", RequestMetadata::default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(unknown, wrong);
        assert_eq!(wrong, ServiceError::InvalidCredential(CredentialFailure::BadPassword));
    }

    struct CountingHasher {
        inner: Argon2Hasher,
        verifies: AtomicUsize,
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, secret: &str) -> ServiceResult<String> {
            self.inner.hash(secret)
        }

        fn verify(&self, digest: &str, secret: &str) -> bool {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(digest, secret)
        }
    }

    #[tokio::test]
    async fn unknown_user_still_pays_for_a_password_verify() {
        let store = Arc::new(InMemoryStore::new());
        let hasher = Arc::new(CountingHasher {
            inner: Argon2Hasher::with_params(256, 1).unwrap(),
            verifies: AtomicUsize::new(0),
        });
        let clock = Arc::new(SystemClock);
        let keys = Arc::new(TokenKeys::from_secret(b"login-test-secret-login-test-secret", "warden"));
        let issuer = TokenIssuer::new(keys, store.clone(), clock, TokenSettings::default());
        let auth = AuthService::new(store.clone(), hasher.clone(), PermissionResolver::new(store), issuer);
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let err = auth
                .login("nobody", DECOY_PASSWORD, RequestMetadata::default(), &cancel)
                .await
                .unwrap_err();
            assert_eq!(err, ServiceError::InvalidCredential(CredentialFailure::BadPassword));
        }
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inactive_account_is_refused_after_password_check() {
        let fx = fixture();
        let user = register(&fx, true).await;
        let cancel = CancellationToken::new();
        let off = UserPatch {
            active: Some(false),
            ..Default::default()
        };
        fx.users.update(user.id, off, &cancel).await.unwrap();

        assert_eq!(
            fx.auth
                .login("linus", "penguins-everywhere", RequestMetadata::default(), &cancel)
                .await
                .unwrap_err(),
            ServiceError::InvalidCredential(CredentialFailure::InactiveAccount)
        );
        assert_eq!(
            fx.auth
                .login("linus", "not-the-password", RequestMetadata::default(), &cancel)
                .await
                .unwrap_err(),
            ServiceError::InvalidCredential(CredentialFailure::BadPassword)
        );
    }
}
