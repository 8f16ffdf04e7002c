use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use warden_auth::{Action, ActionPatch, NewAction};
use warden_core::{ActionId, Clock, ServiceError, ServiceResult};

use super::uniqueness::{UniquenessCheck, ensure_unique};
use crate::cancel::cancellable;
use crate::query::{Page, QueryRequest, QuerySchema, run_query};
use crate::store::ActionStore;

#[derive(Clone)]
pub struct ActionService {
    store: Arc<dyn ActionStore>,
    clock: Arc<dyn Clock>,
    schema: Arc<QuerySchema>,
}

impl ActionService {
    pub fn new(store: Arc<dyn ActionStore>, clock: Arc<dyn Clock>, schema: QuerySchema) -> Self {
        Self {
            store,
            clock,
            schema: Arc::new(schema),
        }
    }

    #[instrument(skip(self, input, cancel), fields(name = %input.name), err)]
    pub async fn create(&self, input: NewAction, cancel: &CancellationToken) -> ServiceResult<Action> {
        input.validate()?;
        cancellable(
            cancel,
            ensure_unique(vec![UniquenessCheck::new("name", self.store.action_name_exists(&input.name))]),
        )
        .await?;

        let now = self.clock.now();
        let action = Action {
            id: ActionId::new(),
            name: input.name,
            description: input.description,
            active: input.active,
            created_at: now,
            updated_at: now,
        };
        cancellable(cancel, self.store.insert_action(&action)).await?;

        tracing::info!(action_id = %action.id, name = %action.name, "action created");
        Ok(action)
    }

    #[instrument(skip(self, patch, cancel), fields(action_id = %id), err)]
    pub async fn update(
        &self,
        id: ActionId,
        patch: ActionPatch,
        cancel: &CancellationToken,
    ) -> ServiceResult<Action> {
        patch.validate()?;
        let current = cancellable(cancel, self.store.action_by_id(id))
            .await?
            .ok_or(ServiceError::DataNotFound)?;

        if let Some(name) = patch.name.as_deref().filter(|n| *n != current.name) {
            cancellable(
                cancel,
                ensure_unique(vec![UniquenessCheck::new("name", self.store.action_name_exists(name))]),
            )
            .await?;
        }

        let action = cancellable(cancel, self.store.update_action(id, &patch, self.clock.now())).await?;
        tracing::info!(action_id = %action.id, active = action.active, "action updated");
        Ok(action)
    }

    #[instrument(skip(self, cancel), fields(action_id = %id), err)]
    pub async fn get(&self, id: ActionId, cancel: &CancellationToken) -> ServiceResult<Action> {
        cancellable(cancel, self.store.action_by_id(id))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, cancel), err)]
    pub async fn get_by_name(&self, name: &str, cancel: &CancellationToken) -> ServiceResult<Action> {
        cancellable(cancel, self.store.action_by_name(name))
            .await?
            .ok_or(ServiceError::DataNotFound)
    }

    #[instrument(skip(self, request, cancel), err)]
    pub async fn query(&self, request: &QueryRequest, cancel: &CancellationToken) -> ServiceResult<Page<Action>> {
        let plan = self.schema.plan(request)?;
        cancellable(
            cancel,
            run_query(&plan, self.store.fetch_actions(&plan), self.store.count_actions(&plan)),
        )
        .await
    }
}
