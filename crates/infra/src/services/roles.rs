use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::{NewRole, Role, RolePatch};
use warden_core::{Clock, RoleId, ServiceError, ServiceResult};

use super::uniqueness::{UniquenessCheck, ensure_unique};
use crate::cancel::cancellable;
use crate::query::{Page, QueryRequest, QuerySchema, run_query};
use crate::store::RoleStore;

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn RoleStore>,
    clock: Arc<dyn Clock>,
    schema: Arc<QuerySchema>,
}

impl RoleService {
    pub fn new(store: Arc<dyn RoleStore>, clock: Arc<dyn Clock>, schema: QuerySchema) -> Self {
        Self {
            store,
            clock,
            schema: Arc::new(schema),
        }
    }

    #[instrument(skip(self, input, cancel), fields(name = %input.name), err)]
    pub async fn create(&self, input: NewRole, cancel: &CancellationToken) -> ServiceResult<Role> {
        input.validate()?;
        cancellable(
            cancel,
            ensure_unique(vec![UniquenessCheck::new("name", self.store.role_name_exists(&input.name))]),
        )
        .await?;

        let now = self.clock.now();
        let role = Role {
            id: RoleId::new(),
            name: input.name,
            description: input.description,
            active: input.active,
            created_at: now,
            updated_at: now,
        };
        cancellable(cancel, self.store.insert_role(&role)).await?;

        tracing::info!(role_id = %role.id, "role created");
        Ok(role)
    }

    /// Deactivating a role keeps it readable and assignable; it only stops
    /// contributing actions to effective permission sets.
    #[instrument(skip(self, patch, cancel), fields(role_id = %id), err)]
    pub async fn update(&self, id: RoleId, patch: RolePatch, cancel: &CancellationToken) -> ServiceResult<Role> {
        patch.validate()?;
        let current = cancellable(cancel, self.store.role_by_id(id))
            .await?
            .ok_or(ServiceError::DataNotFound)?;

        if let Some(name) = patch.name.as_deref().filter(|n| *n != current.name) {
            cancellable(
                cancel,
                ensure_unique(vec![UniquenessCheck::new("name", self.store.role_name_exists(name))]),
            )
            .await?;
        }

        let role = cancellable(cancel, self.store.update_role(id, &patch, self.clock.now())).await?;
        tracing::info!(role_id = %role.id, active = role.active, "role updated");
        Ok(role)
    }

    #[instrument(skip(self, cancel), fields(role_id = %id), err)]
    pub async fn get(&self, id: RoleId, cancel: &CancellationToken) -> ServiceResult<Role> {
        cancellable(cancel, self.store.role_by_id(id))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, cancel), err)]
    pub async fn get_by_name(&self, name: &str, cancel: &CancellationToken) -> ServiceResult<Role> {
        cancellable(cancel, self.store.role_by_name(name))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, request, cancel), err)]
    pub async fn query(&self, request: &QueryRequest, cancel: &CancellationToken) -> ServiceResult<Page<Role>> {
        let plan = self.schema.plan(request)?;
        cancellable(
            cancel,
            run_query(&plan, self.store.fetch_roles(&plan), self.store.count_roles(&plan)),
        )
        .await
    }
}
