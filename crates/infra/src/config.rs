//! Configuration loading and representation.
//!
//! Everything comes from `WARDEN_*` environment variables. Insecure defaults
//! are allowed outside production and always logged.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

use crate::query::{FilterField, QuerySchema};

pub const DEV_JWT_SECRET: &str = "warden-dev-secret-do-not-use-in-production";
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} is required in production")]
    Missing(&'static str),
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Token lifetimes and issuance switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub issuer: String,
    pub access_ttl: TimeDelta,
    pub refresh_ttl: TimeDelta,
    pub issue_refresh_token: bool,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: "warden".to_string(),
            access_ttl: TimeDelta::seconds(900),
            refresh_ttl: TimeDelta::seconds(604_800),
            issue_refresh_token: false,
        }
    }
}

/// Per-entity query allow-lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub users: QuerySchema,
    pub roles: QuerySchema,
    pub actions: QuerySchema,
}

impl QueryConfig {
    pub fn with_ceiling(max_per_page: u32) -> Self {
        let catalog = |entity: &str| QuerySchema {
            entity: entity.to_string(),
            filterable: vec![
                FilterField::text("name"),
                FilterField::text("description"),
                FilterField::boolean("active"),
            ],
            sortable: vec!["name".into(), "created_at".into(), "updated_at".into()],
            max_per_page,
        };
        Self {
            users: QuerySchema {
                entity: "users".to_string(),
                filterable: vec![
                    FilterField::text("full_name"),
                    FilterField::text("username"),
                    FilterField::text("email"),
                    FilterField::boolean("active"),
                    FilterField::boolean("verified"),
                ],
                sortable: vec![
                    "full_name".into(),
                    "username".into(),
                    "email".into(),
                    "created_at".into(),
                    "updated_at".into(),
                ],
                max_per_page,
            },
            roles: catalog("roles"),
            actions: catalog("actions"),
        }
    }

    fn schemas(&self) -> [&QuerySchema; 3] {
        [&self.users, &self.roles, &self.actions]
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::with_ceiling(100)
    }
}

/// Initial administrator, created at startup if the username is free.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct WardenConfig {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub tokens: TokenSettings,
    /// Argon2 iteration count.
    pub hash_cost: u32,
    pub query: QueryConfig,
    pub request_timeout: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl fmt::Debug for WardenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WardenConfig")
            .field("environment", &self.environment)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("tokens", &self.tokens)
            .field("hash_cost", &self.hash_cost)
            .field("query", &self.query)
            .field("request_timeout", &self.request_timeout)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            database_url: None,
            db_max_connections: 10,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            tokens: TokenSettings::default(),
            hash_cost: 2,
            query: QueryConfig::default(),
            request_timeout: Duration::from_millis(10_000),
            bootstrap_admin: None,
        }
    }
}

impl WardenConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup, then [`validate`](Self::validate).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let environment = match get("WARDEN_ENV").as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "WARDEN_ENV",
                    format!("unknown environment '{other}'"),
                ));
            }
        };

        let jwt_secret = match get("WARDEN_JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                return Err(ConfigError::Missing("WARDEN_JWT_SECRET"));
            }
            None => {
                tracing::warn!("WARDEN_JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let bind_addr = match get("WARDEN_BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("WARDEN_BIND_ADDR", format!("{e}")))?,
            None => defaults.bind_addr,
        };

        let access_secs = parse_or(&get, "WARDEN_ACCESS_TTL_SECS", 900i64)?;
        let refresh_secs = parse_or(&get, "WARDEN_REFRESH_TTL_SECS", 604_800i64)?;
        let max_per_page = parse_or(&get, "WARDEN_MAX_PER_PAGE", 100u32)?;
        let timeout_ms = parse_or(&get, "WARDEN_REQUEST_TIMEOUT_MS", 10_000u64)?;

        let bootstrap_admin = match (
            get("WARDEN_ADMIN_USERNAME"),
            get("WARDEN_ADMIN_EMAIL"),
            get("WARDEN_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(BootstrapAdmin {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::invalid(
                    "WARDEN_ADMIN_USERNAME",
                    "WARDEN_ADMIN_USERNAME, WARDEN_ADMIN_EMAIL and WARDEN_ADMIN_PASSWORD must be set together",
                ));
            }
        };

        let config = Self {
            environment,
            database_url: get("WARDEN_DATABASE_URL"),
            db_max_connections: parse_or(&get, "WARDEN_DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            bind_addr,
            jwt_secret,
            tokens: TokenSettings {
                issuer: get("WARDEN_TOKEN_ISSUER").unwrap_or(defaults.tokens.issuer),
                access_ttl: seconds("WARDEN_ACCESS_TTL_SECS", access_secs)?,
                refresh_ttl: seconds("WARDEN_REFRESH_TTL_SECS", refresh_secs)?,
                issue_refresh_token: parse_or(&get, "WARDEN_ISSUE_REFRESH_TOKEN", false)?,
            },
            hash_cost: parse_or(&get, "WARDEN_HASH_COST", defaults.hash_cost)?,
            query: QueryConfig::with_ceiling(max_per_page),
            request_timeout: Duration::from_millis(timeout_ms),
            bootstrap_admin,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::invalid("WARDEN_JWT_SECRET", "must not be empty"));
        }
        if self.environment == Environment::Production {
            if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
                return Err(ConfigError::invalid(
                    "WARDEN_JWT_SECRET",
                    format!("must be at least {MIN_PRODUCTION_SECRET_LEN} bytes in production"),
                ));
            }
            if self.jwt_secret == DEV_JWT_SECRET {
                return Err(ConfigError::invalid(
                    "WARDEN_JWT_SECRET",
                    "the development default is not allowed in production",
                ));
            }
        }
        if self.tokens.access_ttl <= TimeDelta::zero() {
            return Err(ConfigError::invalid("WARDEN_ACCESS_TTL_SECS", "must be positive"));
        }
        if self.tokens.refresh_ttl <= TimeDelta::zero() {
            return Err(ConfigError::invalid("WARDEN_REFRESH_TTL_SECS", "must be positive"));
        }
        if self.tokens.issuer.is_empty() {
            return Err(ConfigError::invalid("WARDEN_TOKEN_ISSUER", "must not be empty"));
        }
        if self.hash_cost == 0 {
            return Err(ConfigError::invalid("WARDEN_HASH_COST", "must be at least 1"));
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::invalid("WARDEN_DB_MAX_CONNECTIONS", "must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("WARDEN_REQUEST_TIMEOUT_MS", "must be positive"));
        }
        for schema in self.query.schemas() {
            if schema.max_per_page == 0 {
                return Err(ConfigError::invalid("WARDEN_MAX_PER_PAGE", "must be at least 1"));
            }
            let names = schema
                .filterable
                .iter()
                .map(|f| f.name.as_str())
                .chain(schema.sortable.iter().map(String::as_str));
            for name in names {
                if !is_identifier(name) {
                    return Err(ConfigError::invalid(
                        "query allow-list",
                        format!("'{name}' on {} is not a plain column name", schema.entity),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(var, format!("{e}"))),
        None => Ok(default),
    }
}

fn seconds(var: &'static str, secs: i64) -> Result<TimeDelta, ConfigError> {
    TimeDelta::try_seconds(secs).ok_or_else(|| ConfigError::invalid(var, "out of range"))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
