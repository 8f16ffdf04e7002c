//! Infrastructure layer: storage, the query engine, configuration and the
//! services that orchestrate them.

pub mod cancel;
pub mod config;
pub mod query;
pub mod services;
pub mod store;

pub use cancel::{CancelScope, cancellable};
pub use config::{BootstrapAdmin, ConfigError, Environment, QueryConfig, TokenSettings, WardenConfig};
pub use query::{Page, QueryPlan, QueryRequest, QuerySchema};
pub use services::{IssuedToken, Services, bootstrap};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError};
