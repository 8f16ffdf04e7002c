use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::EffectivePermissionSet;
use warden_core::{ServiceResult, UserId};

use crate::cancel::cancellable;
use crate::store::GrantStore;

/// Computes a user's effective permission set from current grants.
///
/// Nothing is cached: every call reads the grant tables, so a deactivated
/// role or revoked action is reflected on the next issuance.
#[derive(Clone)]
pub struct PermissionResolver {
    grants: Arc<dyn GrantStore>,
}

impl PermissionResolver {
    pub fn new(grants: Arc<dyn GrantStore>) -> Self {
        Self { grants }
    }

    /// Fetch direct and role-derived grants side by side, then merge.
    ///
    /// If either fetch fails the other is dropped and the error returned.
    #[instrument(skip(self, cancel), fields(user_id = %user_id), err)]
    pub async fn resolve(&self, user_id: UserId, cancel: &CancellationToken) -> ServiceResult<EffectivePermissionSet> {
        let (direct, via_roles) = cancellable(cancel, async {
            tokio::try_join!(self.grants.direct_actions(user_id), self.grants.role_grants(user_id))
        })
        .await?;

        let set = EffectivePermissionSet::merge(&direct, &via_roles);
        tracing::debug!(actions = set.actions.len(), roles = set.roles.len(), "permissions resolved");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use warden_auth::{Action, NewAction, NewRole, RoleAction, RoleGrant, RolePatch, User, UserAction, UserRole};
    use warden_core::{ActionId, RoleId, ServiceError, SystemClock};

    use crate::config::QueryConfig;
    use crate::services::{ActionService, GrantService, RoleService};
    use crate::store::{InMemoryStore, StoreError, StoreResult, UserStore};

    async fn user(store: &InMemoryStore) -> User {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            full_name: "Ada".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: "x".into(),
            active: true,
            verified: true,
            created_at: now,
            updated_at: now,
        };
        store.insert_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn no_grants_is_empty_not_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let ada = user(&store).await;
        let set = PermissionResolver::new(store)
            .resolve(ada.id, &CancellationToken::new())
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn union_of_direct_and_role_grants() {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(SystemClock);
        let cancel = CancellationToken::new();
        let ada = user(&store).await;

        let roles = RoleService::new(store.clone(), clock.clone(), QueryConfig::default().roles);
        let actions = ActionService::new(store.clone(), clock.clone(), QueryConfig::default().actions);
        let grants = GrantService::new(store.clone(), clock);

        let mut ids = Vec::new();
        for name in ["reports.read", "audit.read", "reports.write"] {
            let action = actions
                .create(
                    NewAction {
                        name: name.into(),
                        description: String::new(),
                        active: true,
                    },
                    &cancel,
                )
                .await
                .unwrap();
            ids.push(action.id);
        }
        let auditor = roles
            .create(
                NewRole {
                    name: "auditor".into(),
                    description: String::new(),
                    active: true,
                },
                &cancel,
            )
            .await
            .unwrap();
        grants.assign_role(ada.id, auditor.id, &cancel).await.unwrap();
        grants.grant_role_action(auditor.id, ids[0], &cancel).await.unwrap();
        grants.grant_role_action(auditor.id, ids[1], &cancel).await.unwrap();
        grants.grant_user_action(ada.id, ids[0], &cancel).await.unwrap();
        grants.grant_user_action(ada.id, ids[2], &cancel).await.unwrap();

        let resolver = PermissionResolver::new(store.clone());
        let set = resolver.resolve(ada.id, &cancel).await.unwrap();
        assert_eq!(set.actions, vec!["audit.read", "reports.read", "reports.write"]);
        assert_eq!(set.roles, vec!["auditor"]);

        // A deactivated role stops contributing but remains assigned.
        let off = RolePatch {
            active: Some(false),
            ..Default::default()
        };
        roles.update(auditor.id, off, &cancel).await.unwrap();
        let set = resolver.resolve(ada.id, &cancel).await.unwrap();
        assert_eq!(set.actions, vec!["reports.read", "reports.write"]);
        assert!(set.roles.is_empty());
        assert_eq!(roles.get(auditor.id, &cancel).await.unwrap().name, "auditor");
    }

    /// Role lookup fails at once while the direct-grant fetch never finishes.
    struct StalledGrants;

    #[async_trait]
    impl GrantStore for StalledGrants {
        async fn insert_user_role(&self, _: &UserRole) -> StoreResult<()> {
            Ok(())
        }
        async fn delete_user_role(&self, _: UserId, _: RoleId) -> StoreResult<bool> {
            Ok(false)
        }
        async fn insert_role_action(&self, _: &RoleAction) -> StoreResult<()> {
            Ok(())
        }
        async fn delete_role_action(&self, _: RoleId, _: ActionId) -> StoreResult<bool> {
            Ok(false)
        }
        async fn insert_user_action(&self, _: &UserAction) -> StoreResult<()> {
            Ok(())
        }
        async fn delete_user_action(&self, _: UserId, _: ActionId) -> StoreResult<bool> {
            Ok(false)
        }
        async fn direct_actions(&self, _: UserId) -> StoreResult<Vec<Action>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
        async fn role_grants(&self, _: UserId) -> StoreResult<Vec<RoleGrant>> {
            Err(StoreError::Backend("connection reset".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn either_fetch_failing_fails_fast() {
        let resolver = PermissionResolver::new(Arc::new(StalledGrants));
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            resolver.resolve(UserId::new(), &CancellationToken::new()),
        )
        .await
        .expect("resolve should not wait for the stalled fetch");
        assert_eq!(result, Err(ServiceError::StoreFailure("connection reset".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_stalled_fetch() {
        struct Stalled;

        #[async_trait]
        impl GrantStore for Stalled {
            async fn insert_user_role(&self, _: &UserRole) -> StoreResult<()> {
                Ok(())
            }
            async fn delete_user_role(&self, _: UserId, _: RoleId) -> StoreResult<bool> {
                Ok(false)
            }
            async fn insert_role_action(&self, _: &RoleAction) -> StoreResult<()> {
                Ok(())
            }
            async fn delete_role_action(&self, _: RoleId, _: ActionId) -> StoreResult<bool> {
                Ok(false)
            }
            async fn insert_user_action(&self, _: &UserAction) -> StoreResult<()> {
                Ok(())
            }
            async fn delete_user_action(&self, _: UserId, _: ActionId) -> StoreResult<bool> {
                Ok(false)
            }
            async fn direct_actions(&self, _: UserId) -> StoreResult<Vec<Action>> {
                std::future::pending().await
            }
            async fn role_grants(&self, _: UserId) -> StoreResult<Vec<RoleGrant>> {
                std::future::pending().await
            }
        }

        let resolver = PermissionResolver::new(Arc::new(Stalled));
        let scope = crate::cancel::CancelScope::start(Duration::from_millis(50));
        assert_eq!(
            resolver.resolve(UserId::new(), scope.token()).await,
            Err(ServiceError::RequestCancelled)
        );
    }
}
