//! Postgres-backed store.
//!
//! All values are bind parameters; dynamic fragments (filters, ordering,
//! partial updates) go through `QueryBuilder`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation { field }`, field taken from the constraint name |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use warden_auth::{
    Action, ActionPatch, Role, RoleAction, RoleGrant, RolePatch, TokenRecord, User, UserAction,
    UserChanges, UserRole,
};
use warden_core::{ActionId, RoleId, TokenUid, UserId};

use super::{
    ActionStore, GrantStore, RoleStore, StoreError, StoreResult, TokenStore, UserStore,
};
use crate::query::{QueryPlan, sql};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const USER_COLUMNS: &str =
    "id, full_name, username, email, password_hash, active, verified, created_at, updated_at";
const CATALOG_COLUMNS: &str = "id, name, description, active, created_at, updated_at";
const TOKEN_COLUMNS: &str = "uid, user_id, access_token, refresh_token, remote_addr, \
     forwarded_for, real_ip, user_agent, created_at, expired_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip_all, err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_page<T>(
        &self,
        operation: &str,
        table: &str,
        columns: &str,
        plan: &QueryPlan,
        map: fn(&PgRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Vec<T>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {columns} FROM {table}"));
        sql::push_where(&mut qb, plan);
        sql::push_order_and_page(&mut qb, plan);

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter()
            .map(map)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn count(&self, operation: &str, table: &str, plan: &QueryPlan) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {table}"));
        sql::push_where(&mut qb, plan);

        let total: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(total.max(0) as u64)
    }

    async fn exists(&self, operation: &str, sql: &str, value: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn delete_pair(&self, operation: &str, sql: &str, left: Uuid, right: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(sql)
            .bind(left)
            .bind(right)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_id", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_by_id", e))
    }

    #[instrument(skip(self), err)]
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_username", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_by_username", e))
    }

    #[instrument(skip(self, email), err)]
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_email", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("user_by_email", e))
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        self.exists(
            "username_exists",
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)",
            username,
        )
        .await
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        self.exists(
            "email_exists",
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)",
            email,
        )
        .await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(*user.id.as_uuid())
        .bind(&user.full_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.active)
        .bind(user.verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update_user(&self, id: UserId, changes: &UserChanges, at: DateTime<Utc>) -> StoreResult<User> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = ");
        qb.push_bind(at);
        if let Some(v) = &changes.full_name {
            qb.push(", full_name = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.username {
            qb.push(", username = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.email {
            qb.push(", email = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.password_hash {
            qb.push(", password_hash = ").push_bind(v.clone());
        }
        if let Some(v) = changes.active {
            qb.push(", active = ").push_bind(v);
        }
        if let Some(v) = changes.verified {
            qb.push(", verified = ").push_bind(v);
        }
        qb.push(" WHERE id = ").push_bind(*id.as_uuid());
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?
            .ok_or(StoreError::NotFound)?;
        user_from_row(&row).map_err(|e| map_sqlx_error("update_user", e))
    }

    #[instrument(skip(self, plan), err)]
    async fn fetch_users(&self, plan: &QueryPlan) -> StoreResult<Vec<User>> {
        self.fetch_page("fetch_users", "users", USER_COLUMNS, plan, user_from_row)
            .await
    }

    #[instrument(skip(self, plan), err)]
    async fn count_users(&self, plan: &QueryPlan) -> StoreResult<u64> {
        self.count("count_users", "users", plan).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl RoleStore for PostgresStore {
    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let row = sqlx::query(&format!("SELECT {CATALOG_COLUMNS} FROM roles WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_id", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("role_by_id", e))
    }

    #[instrument(skip(self), err)]
    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let row = sqlx::query(&format!("SELECT {CATALOG_COLUMNS} FROM roles WHERE name = $1"))
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_name", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("role_by_name", e))
    }

    async fn role_name_exists(&self, name: &str) -> StoreResult<bool> {
        self.exists(
            "role_name_exists",
            "SELECT EXISTS (SELECT 1 FROM roles WHERE name = $1)",
            name,
        )
        .await
    }

    #[instrument(skip(self, role), fields(role_id = %role.id), err)]
    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO roles ({CATALOG_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(*role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.active)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    #[instrument(skip(self, patch), fields(role_id = %id), err)]
    async fn update_role(&self, id: RoleId, patch: &RolePatch, at: DateTime<Utc>) -> StoreResult<Role> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE roles SET updated_at = ");
        qb.push_bind(at);
        push_catalog_patch(&mut qb, &patch.name, &patch.description, patch.active);
        qb.push(" WHERE id = ").push_bind(*id.as_uuid());
        qb.push(format!(" RETURNING {CATALOG_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_role", e))?
            .ok_or(StoreError::NotFound)?;
        role_from_row(&row).map_err(|e| map_sqlx_error("update_role", e))
    }

    #[instrument(skip(self, plan), err)]
    async fn fetch_roles(&self, plan: &QueryPlan) -> StoreResult<Vec<Role>> {
        self.fetch_page("fetch_roles", "roles", CATALOG_COLUMNS, plan, role_from_row)
            .await
    }

    #[instrument(skip(self, plan), err)]
    async fn count_roles(&self, plan: &QueryPlan) -> StoreResult<u64> {
        self.count("count_roles", "roles", plan).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ActionStore for PostgresStore {
    #[instrument(skip(self), fields(action_id = %id), err)]
    async fn action_by_id(&self, id: ActionId) -> StoreResult<Option<Action>> {
        let row = sqlx::query(&format!("SELECT {CATALOG_COLUMNS} FROM actions WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("action_by_id", e))?;
        row.as_ref()
            .map(action_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("action_by_id", e))
    }

    #[instrument(skip(self), err)]
    async fn action_by_name(&self, name: &str) -> StoreResult<Option<Action>> {
        let row = sqlx::query(&format!("SELECT {CATALOG_COLUMNS} FROM actions WHERE name = $1"))
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("action_by_name", e))?;
        row.as_ref()
            .map(action_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("action_by_name", e))
    }

    async fn action_name_exists(&self, name: &str) -> StoreResult<bool> {
        self.exists(
            "action_name_exists",
            "SELECT EXISTS (SELECT 1 FROM actions WHERE name = $1)",
            name,
        )
        .await
    }

    #[instrument(skip(self, action), fields(action_id = %action.id), err)]
    async fn insert_action(&self, action: &Action) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO actions ({CATALOG_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(*action.id.as_uuid())
        .bind(&action.name)
        .bind(&action.description)
        .bind(action.active)
        .bind(action.created_at)
        .bind(action.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_action", e))?;
        Ok(())
    }

    #[instrument(skip(self, patch), fields(action_id = %id), err)]
    async fn update_action(&self, id: ActionId, patch: &ActionPatch, at: DateTime<Utc>) -> StoreResult<Action> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE actions SET updated_at = ");
        qb.push_bind(at);
        push_catalog_patch(&mut qb, &patch.name, &patch.description, patch.active);
        qb.push(" WHERE id = ").push_bind(*id.as_uuid());
        qb.push(format!(" RETURNING {CATALOG_COLUMNS}"));

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_action", e))?
            .ok_or(StoreError::NotFound)?;
        action_from_row(&row).map_err(|e| map_sqlx_error("update_action", e))
    }

    #[instrument(skip(self, plan), err)]
    async fn fetch_actions(&self, plan: &QueryPlan) -> StoreResult<Vec<Action>> {
        self.fetch_page("fetch_actions", "actions", CATALOG_COLUMNS, plan, action_from_row)
            .await
    }

    #[instrument(skip(self, plan), err)]
    async fn count_actions(&self, plan: &QueryPlan) -> StoreResult<u64> {
        self.count("count_actions", "actions", plan).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grants
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl GrantStore for PostgresStore {
    #[instrument(skip(self, grant), fields(user_id = %grant.user_id, role_id = %grant.role_id), err)]
    async fn insert_user_role(&self, grant: &UserRole) -> StoreResult<()> {
        sqlx::query("INSERT INTO user_roles (id, user_id, role_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(*grant.id.as_uuid())
            .bind(*grant.user_id.as_uuid())
            .bind(*grant.role_id.as_uuid())
            .bind(grant.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_user_role", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), err)]
    async fn delete_user_role(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool> {
        self.delete_pair(
            "delete_user_role",
            "DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2",
            *user_id.as_uuid(),
            *role_id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self, grant), fields(role_id = %grant.role_id, action_id = %grant.action_id), err)]
    async fn insert_role_action(&self, grant: &RoleAction) -> StoreResult<()> {
        sqlx::query("INSERT INTO role_actions (id, role_id, action_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(*grant.id.as_uuid())
            .bind(*grant.role_id.as_uuid())
            .bind(*grant.action_id.as_uuid())
            .bind(grant.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_role_action", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(role_id = %role_id, action_id = %action_id), err)]
    async fn delete_role_action(&self, role_id: RoleId, action_id: ActionId) -> StoreResult<bool> {
        self.delete_pair(
            "delete_role_action",
            "DELETE FROM role_actions WHERE role_id = $1 AND action_id = $2",
            *role_id.as_uuid(),
            *action_id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self, grant), fields(user_id = %grant.user_id, action_id = %grant.action_id), err)]
    async fn insert_user_action(&self, grant: &UserAction) -> StoreResult<()> {
        sqlx::query("INSERT INTO user_actions (id, user_id, action_id, created_at) VALUES ($1, $2, $3, $4)")
            .bind(*grant.id.as_uuid())
            .bind(*grant.user_id.as_uuid())
            .bind(*grant.action_id.as_uuid())
            .bind(grant.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_user_action", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, action_id = %action_id), err)]
    async fn delete_user_action(&self, user_id: UserId, action_id: ActionId) -> StoreResult<bool> {
        self.delete_pair(
            "delete_user_action",
            "DELETE FROM user_actions WHERE user_id = $1 AND action_id = $2",
            *user_id.as_uuid(),
            *action_id.as_uuid(),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn direct_actions(&self, user_id: UserId) -> StoreResult<Vec<Action>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.name, a.description, a.active, a.created_at, a.updated_at
            FROM user_actions ua
            JOIN actions a ON a.id = ua.action_id
            WHERE ua.user_id = $1
            "#,
        )
        .bind(*user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("direct_actions", e))?;

        rows.iter()
            .map(action_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("direct_actions", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn role_grants(&self, user_id: UserId) -> StoreResult<Vec<RoleGrant>> {
        let rows = sqlx::query(
            r#"
            SELECT
                r.id          AS role_id,
                r.name        AS role_name,
                r.description AS role_description,
                r.active      AS role_active,
                r.created_at  AS role_created_at,
                r.updated_at  AS role_updated_at,
                a.id          AS action_id,
                a.name        AS action_name,
                a.description AS action_description,
                a.active      AS action_active,
                a.created_at  AS action_created_at,
                a.updated_at  AS action_updated_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_actions ra ON ra.role_id = r.id
            LEFT JOIN actions a ON a.id = ra.action_id
            WHERE ur.user_id = $1
            ORDER BY r.name ASC, r.id ASC
            "#,
        )
        .bind(*user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_grants", e))?;

        fold_role_grants(&rows).map_err(|e| map_sqlx_error("role_grants", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TokenStore for PostgresStore {
    #[instrument(skip(self, record), fields(uid = %record.uid, user_id = %record.user_id), err)]
    async fn insert_token(&self, record: &TokenRecord) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO tokens ({TOKEN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(*record.uid.as_uuid())
        .bind(*record.user_id.as_uuid())
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(&record.remote_addr)
        .bind(&record.forwarded_for)
        .bind(&record.real_ip)
        .bind(&record.user_agent)
        .bind(record.created_at)
        .bind(record.expired_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_token", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(uid = %uid), err)]
    async fn token_by_uid(&self, uid: TokenUid) -> StoreResult<Option<TokenRecord>> {
        let row = sqlx::query(&format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE uid = $1"))
            .bind(*uid.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("token_by_uid", e))?;
        row.as_ref()
            .map(token_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("token_by_uid", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn push_catalog_patch(
    qb: &mut QueryBuilder<'_, Postgres>,
    name: &Option<String>,
    description: &Option<String>,
    active: Option<bool>,
) {
    if let Some(v) = name {
        qb.push(", name = ").push_bind(v.clone());
    }
    if let Some(v) = description {
        qb.push(", description = ").push_bind(v.clone());
    }
    if let Some(v) = active {
        qb.push(", active = ").push_bind(v);
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        full_name: row.try_get("full_name")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        active: row.try_get("active")?,
        verified: row.try_get("verified")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn action_from_row(row: &PgRow) -> Result<Action, sqlx::Error> {
    Ok(Action {
        id: ActionId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<TokenRecord, sqlx::Error> {
    Ok(TokenRecord {
        uid: TokenUid::from_uuid(row.try_get("uid")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        remote_addr: row.try_get("remote_addr")?,
        forwarded_for: row.try_get("forwarded_for")?,
        real_ip: row.try_get("real_ip")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
        expired_at: row.try_get("expired_at")?,
    })
}

/// Fold the role/action join (one row per pair, or one row with NULL action
/// columns for a role without actions) into one grant per role.
fn fold_role_grants(rows: &[PgRow]) -> Result<Vec<RoleGrant>, sqlx::Error> {
    let mut grants: Vec<RoleGrant> = Vec::new();
    for row in rows {
        let role_id = RoleId::from_uuid(row.try_get("role_id")?);
        if grants.last().map(|g| g.role.id) != Some(role_id) {
            grants.push(RoleGrant {
                role: Role {
                    id: role_id,
                    name: row.try_get("role_name")?,
                    description: row.try_get("role_description")?,
                    active: row.try_get("role_active")?,
                    created_at: row.try_get("role_created_at")?,
                    updated_at: row.try_get("role_updated_at")?,
                },
                actions: Vec::new(),
            });
        }
        let Some(action_id) = row.try_get::<Option<Uuid>, _>("action_id")? else {
            continue;
        };
        let action = Action {
            id: ActionId::from_uuid(action_id),
            name: row.try_get("action_name")?,
            description: row.try_get("action_description")?,
            active: row.try_get("action_active")?,
            created_at: row.try_get("action_created_at")?,
            updated_at: row.try_get("action_updated_at")?,
        };
        if let Some(grant) = grants.last_mut() {
            grant.actions.push(action);
        }
    }
    Ok(grants)
}

fn unique_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_username_key") => "username",
        Some("users_email_key") => "email",
        Some("roles_name_key") | Some("actions_name_key") => "name",
        Some("user_roles_user_id_role_id_key") => "role_id",
        Some("role_actions_role_id_action_id_key") => "action_id",
        Some("user_actions_user_id_action_id_key") => "action_id",
        Some("tokens_pkey") => "uid",
        _ => "id",
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::unique(unique_field(db_err.constraint())),
            Some("23503") => StoreError::NotFound,
            _ => StoreError::Backend(format!(
                "database error in {operation}: {}",
                db_err.message()
            )),
        },
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_input_fields() {
        assert_eq!(unique_field(Some("users_username_key")), "username");
        assert_eq!(unique_field(Some("users_email_key")), "email");
        assert_eq!(unique_field(Some("roles_name_key")), "name");
        assert_eq!(unique_field(Some("user_roles_user_id_role_id_key")), "role_id");
        assert_eq!(unique_field(None), "id");
    }

    #[test]
    fn schema_declares_every_mapped_constraint() {
        for name in [
            "users_username_key",
            "users_email_key",
            "roles_name_key",
            "actions_name_key",
            "user_roles_user_id_role_id_key",
            "role_actions_role_id_action_id_key",
            "user_actions_user_id_action_id_key",
        ] {
            assert!(SCHEMA.contains(name), "schema is missing {name}");
        }
    }

    #[test]
    fn sortable_text_columns_use_byte_order_collation() {
        let varchar_lines: Vec<&str> = SCHEMA.lines().filter(|l| l.contains("VARCHAR")).collect();
        assert_eq!(varchar_lines.len(), 7);
        for line in varchar_lines {
            assert!(line.contains(r#"COLLATE "C""#), "missing C collation: {line}");
        }
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        assert_eq!(
            map_sqlx_error("lookup", sqlx::Error::RowNotFound),
            StoreError::NotFound
        );
        assert!(matches!(
            map_sqlx_error("lookup", sqlx::Error::PoolTimedOut),
            StoreError::Backend(_)
        ));
    }
}
