//! Service layer: validation, concurrent pre-checks and orchestration on top
//! of the store traits.
//!
//! Every operation takes a `CancellationToken`; once it fires, pending store
//! work is dropped and the operation returns `RequestCancelled`.

use std::sync::Arc;

use warden_auth::{Argon2Hasher, PasswordHasher, TokenAuthenticator, TokenKeys};
use warden_core::{Clock, ServiceResult};

use crate::config::WardenConfig;
use crate::store::Store;

mod actions;
mod auth;
mod bootstrap;
mod grants;
mod hashing;
mod issuer;
mod resolver;
mod roles;
pub mod uniqueness;
mod users;

pub use actions::ActionService;
pub use auth::AuthService;
pub use bootstrap::{ADMIN_ROLE, bootstrap};
pub use grants::GrantService;
pub use issuer::{IssuedToken, TokenIssuer};
pub use resolver::PermissionResolver;
pub use roles::RoleService;
pub use users::UserService;

/// Every service wired against one store.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub roles: RoleService,
    pub actions: ActionService,
    pub grants: GrantService,
    pub resolver: PermissionResolver,
    pub issuer: TokenIssuer,
    pub auth: AuthService,
    pub authenticator: TokenAuthenticator,
}

impl Services {
    pub fn new<S: Store>(store: Arc<S>, config: &WardenConfig, clock: Arc<dyn Clock>) -> ServiceResult<Self> {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::new(config.hash_cost)?);
        Ok(Self::with_hasher(store, config, clock, hasher))
    }

    /// Same as [`Services::new`] with an explicit hasher, so tests can use
    /// cheap hashing parameters.
    pub fn with_hasher<S: Store>(
        store: Arc<S>,
        config: &WardenConfig,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let keys = Arc::new(TokenKeys::from_secret(
            config.jwt_secret.as_bytes(),
            config.tokens.issuer.clone(),
        ));
        let resolver = PermissionResolver::new(store.clone());
        let issuer = TokenIssuer::new(keys.clone(), store.clone(), clock.clone(), config.tokens.clone());

        Self {
            users: UserService::new(store.clone(), hasher.clone(), clock.clone(), config.query.users.clone()),
            roles: RoleService::new(store.clone(), clock.clone(), config.query.roles.clone()),
            actions: ActionService::new(store.clone(), clock.clone(), config.query.actions.clone()),
            grants: GrantService::new(store.clone(), clock.clone()),
            auth: AuthService::new(store, hasher, resolver.clone(), issuer.clone()),
            authenticator: TokenAuthenticator::new(keys, clock),
            resolver,
            issuer,
        }
    }
}
