//! Grant management: role membership, role actions and direct actions.
//!
//! Both ends of an association must exist. The store enforces that with its
//! foreign keys and reports a missing end as `NotFound`; a repeated grant
//! trips the pair's unique index.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::{RoleAction, UserAction, UserRole};
use warden_core::{ActionId, Clock, GrantId, RoleId, ServiceError, ServiceResult, UserId};

use crate::cancel::cancellable;
use crate::store::GrantStore;

#[derive(Clone)]
pub struct GrantService {
    store: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
}

impl GrantService {
    pub fn new(store: Arc<dyn GrantStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, cancel), fields(user_id = %user_id, role_id = %role_id), err)]
    pub async fn assign_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        cancel: &CancellationToken,
    ) -> ServiceResult<UserRole> {
        let grant = UserRole {
            id: GrantId::new(),
            user_id,
            role_id,
            created_at: self.clock.now(),
        };
        cancellable(cancel, self.store.insert_user_role(&grant)).await?;
        tracing::info!("role assigned");
        Ok(grant)
    }

    #[instrument(skip(self, cancel), fields(user_id = %user_id, role_id = %role_id), err)]
    pub async fn revoke_role(&self, user_id: UserId, role_id: RoleId, cancel: &CancellationToken) -> ServiceResult<()> {
        removed(cancellable(cancel, self.store.delete_user_role(user_id, role_id)).await?)
    }

    #[instrument(skip(self, cancel), fields(role_id = %role_id, action_id = %action_id), err)]
    pub async fn grant_role_action(
        &self,
        role_id: RoleId,
        action_id: ActionId,
        cancel: &CancellationToken,
    ) -> ServiceResult<RoleAction> {
        let grant = RoleAction {
            id: GrantId::new(),
            role_id,
            action_id,
            created_at: self.clock.now(),
        };
        cancellable(cancel, self.store.insert_role_action(&grant)).await?;
        tracing::info!("action granted to role");
        Ok(grant)
    }

    #[instrument(skip(self, cancel), fields(role_id = %role_id, action_id = %action_id), err)]
    pub async fn revoke_role_action(
        &self,
        role_id: RoleId,
        action_id: ActionId,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        removed(cancellable(cancel, self.store.delete_role_action(role_id, action_id)).await?)
    }

    #[instrument(skip(self, cancel), fields(user_id = %user_id, action_id = %action_id), err)]
    pub async fn grant_user_action(
        &self,
        user_id: UserId,
        action_id: ActionId,
        cancel: &CancellationToken,
    ) -> ServiceResult<UserAction> {
        let grant = UserAction {
            id: GrantId::new(),
            user_id,
            action_id,
            created_at: self.clock.now(),
        };
        cancellable(cancel, self.store.insert_user_action(&grant)).await?;
        tracing::info!("action granted to user");
        Ok(grant)
    }

    #[instrument(skip(self, cancel), fields(user_id = %user_id, action_id = %action_id), err)]
    pub async fn revoke_user_action(
        &self,
        user_id: UserId,
        action_id: ActionId,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        removed(cancellable(cancel, self.store.delete_user_action(user_id, action_id)).await?)
    }
}

fn removed(deleted: bool) -> ServiceResult<()> {
    if deleted { Ok(()) } else { Err(ServiceError::DataNotFound) }
}
