//! Storage seams, one trait per entity family.
//!
//! Services depend on these traits only; the concrete backend ([`InMemoryStore`]
//! or [`PostgresStore`]) is chosen at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_auth::{
    Action, ActionPatch, Role, RoleAction, RoleGrant, RolePatch, TokenRecord, User, UserAction,
    UserChanges, UserRole,
};
use warden_core::{ActionId, RoleId, ServiceError, TokenUid, UserId, error::already_exists};

use crate::query::QueryPlan;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Storage-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected the write. `field` names the colliding input.
    #[error("unique violation on {field}")]
    UniqueViolation { field: String },

    #[error("record not found")]
    NotFound,

    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(field: impl Into<String>) -> Self {
        Self::UniqueViolation {
            field: field.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { field } => {
                let message = already_exists(&field);
                ServiceError::DuplicateData([(field, message)].into())
            }
            StoreError::NotFound => ServiceError::DataNotFound,
            StoreError::Backend(cause) => {
                tracing::error!(%cause, "store failure");
                ServiceError::StoreFailure(cause)
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn username_exists(&self, username: &str) -> StoreResult<bool>;
    async fn email_exists(&self, email: &str) -> StoreResult<bool>;

    /// Fails with [`StoreError::UniqueViolation`] on a taken username or email.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    /// Apply `changes` and refresh `updated_at`; returns the stored row.
    async fn update_user(&self, id: UserId, changes: &UserChanges, at: DateTime<Utc>) -> StoreResult<User>;

    async fn fetch_users(&self, plan: &QueryPlan) -> StoreResult<Vec<User>>;
    async fn count_users(&self, plan: &QueryPlan) -> StoreResult<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>>;
    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn role_name_exists(&self, name: &str) -> StoreResult<bool>;
    async fn insert_role(&self, role: &Role) -> StoreResult<()>;
    async fn update_role(&self, id: RoleId, patch: &RolePatch, at: DateTime<Utc>) -> StoreResult<Role>;
    async fn fetch_roles(&self, plan: &QueryPlan) -> StoreResult<Vec<Role>>;
    async fn count_roles(&self, plan: &QueryPlan) -> StoreResult<u64>;
}

#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn action_by_id(&self, id: ActionId) -> StoreResult<Option<Action>>;
    async fn action_by_name(&self, name: &str) -> StoreResult<Option<Action>>;
    async fn action_name_exists(&self, name: &str) -> StoreResult<bool>;
    async fn insert_action(&self, action: &Action) -> StoreResult<()>;
    async fn update_action(&self, id: ActionId, patch: &ActionPatch, at: DateTime<Utc>) -> StoreResult<Action>;
    async fn fetch_actions(&self, plan: &QueryPlan) -> StoreResult<Vec<Action>>;
    async fn count_actions(&self, plan: &QueryPlan) -> StoreResult<u64>;
}

/// The three association tables. Each `(left, right)` pair is unique.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn insert_user_role(&self, grant: &UserRole) -> StoreResult<()>;
    async fn delete_user_role(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool>;
    async fn insert_role_action(&self, grant: &RoleAction) -> StoreResult<()>;
    async fn delete_role_action(&self, role_id: RoleId, action_id: ActionId) -> StoreResult<bool>;
    async fn insert_user_action(&self, grant: &UserAction) -> StoreResult<()>;
    async fn delete_user_action(&self, user_id: UserId, action_id: ActionId) -> StoreResult<bool>;

    /// Actions granted directly to the user, active or not.
    async fn direct_actions(&self, user_id: UserId) -> StoreResult<Vec<Action>>;

    /// Roles held by the user, each with all of its actions.
    async fn role_grants(&self, user_id: UserId) -> StoreResult<Vec<RoleGrant>>;
}

/// Write-once audit log of issued tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, record: &TokenRecord) -> StoreResult<()>;
    async fn token_by_uid(&self, uid: TokenUid) -> StoreResult<Option<TokenRecord>>;
}

/// Every store capability in one bound.
pub trait Store: UserStore + RoleStore + ActionStore + GrantStore + TokenStore + 'static {}

impl<T> Store for T where T: UserStore + RoleStore + ActionStore + GrantStore + TokenStore + 'static {}
