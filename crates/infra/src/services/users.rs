use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::{NewUser, PasswordHasher, User, UserChanges, UserPatch};
use warden_core::{Clock, ServiceError, ServiceResult, UserId};

use super::hashing::hash_password;
use super::uniqueness::{UniquenessCheck, ensure_unique};
use crate::cancel::cancellable;
use crate::query::{Page, QueryRequest, QuerySchema, run_query};
use crate::store::UserStore;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    schema: Arc<QuerySchema>,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        schema: QuerySchema,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
            schema: Arc::new(schema),
        }
    }

    /// Validate, pre-check username and email while hashing the password,
    /// then insert.
    #[instrument(skip(self, input, cancel), fields(username = %input.username), err)]
    pub async fn create(&self, input: NewUser, cancel: &CancellationToken) -> ServiceResult<User> {
        let input = input.normalized();
        input.validate()?;

        let checks = vec![
            UniquenessCheck::new("username", self.store.username_exists(&input.username)),
            UniquenessCheck::new("email", self.store.email_exists(&input.email)),
        ];
        let hashing = hash_password(self.hasher.clone(), input.password.clone());
        let ((), password_hash) = cancellable(cancel, async {
            tokio::try_join!(ensure_unique(checks), hashing)
        })
        .await?;

        let now = self.clock.now();
        let user = User {
            id: UserId::new(),
            full_name: input.full_name,
            username: input.username,
            email: input.email,
            password_hash,
            active: input.active,
            verified: input.verified,
            created_at: now,
            updated_at: now,
        };
        cancellable(cancel, self.store.insert_user(&user)).await?;

        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Apply a partial update. Only fields that actually change are
    /// re-checked for uniqueness; a new password is hashed alongside.
    #[instrument(skip(self, patch, cancel), fields(user_id = %id), err)]
    pub async fn update(&self, id: UserId, patch: UserPatch, cancel: &CancellationToken) -> ServiceResult<User> {
        let patch = patch.normalized();
        patch.validate()?;

        let current = cancellable(cancel, self.store.user_by_id(id))
            .await?
            .ok_or(ServiceError::DataNotFound)?;

        let mut checks = Vec::new();
        if let Some(username) = patch.username.as_deref().filter(|u| *u != current.username) {
            checks.push(UniquenessCheck::new("username", self.store.username_exists(username)));
        }
        if let Some(email) = patch.email.as_deref().filter(|e| *e != current.email) {
            checks.push(UniquenessCheck::new("email", self.store.email_exists(email)));
        }
        let rehash = match patch.password.clone() {
            Some(password) => hash_password(self.hasher.clone(), password).map(|r| r.map(Some)).boxed(),
            None => async { Ok::<_, ServiceError>(None) }.boxed(),
        };
        let ((), password_hash) = cancellable(cancel, async {
            tokio::try_join!(ensure_unique(checks), rehash)
        })
        .await?;

        let changes = UserChanges {
            full_name: patch.full_name,
            username: patch.username,
            email: patch.email,
            password_hash,
            active: patch.active,
            verified: patch.verified,
        };
        let user = cancellable(cancel, self.store.update_user(id, &changes, self.clock.now())).await?;

        tracing::info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self, cancel), fields(user_id = %id), err)]
    pub async fn get(&self, id: UserId, cancel: &CancellationToken) -> ServiceResult<User> {
        cancellable(cancel, self.store.user_by_id(id))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, cancel), err)]
    pub async fn get_by_username(&self, username: &str, cancel: &CancellationToken) -> ServiceResult<User> {
        cancellable(cancel, self.store.user_by_username(username))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, email, cancel), err)]
    pub async fn get_by_email(&self, email: &str, cancel: &CancellationToken) -> ServiceResult<User> {
        let email = email.trim().to_lowercase();
        cancellable(cancel, self.store.user_by_email(&email))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, request, cancel), err)]
    pub async fn query(&self, request: &QueryRequest, cancel: &CancellationToken) -> ServiceResult<Page<User>> {
        let plan = self.schema.plan(request)?;
        cancellable(
            cancel,
            run_query(&plan, self.store.fetch_users(&plan), self.store.count_users(&plan)),
        )
        .await
    }
}
