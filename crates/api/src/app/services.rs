//! Store selection and service wiring for the HTTP app.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use warden_core::{Clock, SystemClock};
use warden_infra::{InMemoryStore, PostgresStore, Services, WardenConfig, bootstrap};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(services: Services, request_timeout: Duration) -> Self {
        Self {
            services,
            request_timeout,
        }
    }
}

/// Connect the configured store, wire the services and run startup seeding.
///
/// Without `database_url` everything lives in memory and is lost on exit.
pub async fn build_state(config: &WardenConfig) -> anyhow::Result<Arc<AppState>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let services = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.db_max_connections)
                .await
                .context("connecting to postgres")?;
            store.ensure_schema().await.context("applying schema")?;
            tracing::info!(max_connections = config.db_max_connections, "using postgres store");
            Services::new(Arc::new(store), config, clock)?
        }
        None => {
            tracing::warn!("WARDEN_DATABASE_URL not set; using in-memory store");
            Services::new(Arc::new(InMemoryStore::new()), config, clock)?
        }
    };

    bootstrap(&services, config.bootstrap_admin.as_ref(), &CancellationToken::new())
        .await
        .context("seeding builtin actions")?;

    Ok(Arc::new(AppState::new(services, config.request_timeout)))
}
