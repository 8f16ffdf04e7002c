//! In-memory store for development and tests.
//!
//! Enforces the same unique and foreign-key constraints as the relational
//! schema, checked under the write lock, so concurrent creators race exactly
//! the way they do against Postgres.

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use warden_auth::{
    Action, ActionPatch, Role, RoleAction, RoleGrant, RolePatch, TokenRecord, User, UserAction,
    UserChanges, UserRole,
};
use warden_core::{ActionId, Entity, RoleId, TokenUid, UserId};

use super::{
    ActionStore, GrantStore, RoleStore, StoreError, StoreResult, TokenStore, UserStore,
};
use crate::query::QueryPlan;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    roles: HashMap<RoleId, Role>,
    actions: HashMap<ActionId, Action>,
    user_roles: HashMap<(UserId, RoleId), UserRole>,
    role_actions: HashMap<(RoleId, ActionId), RoleAction>,
    user_actions: HashMap<(UserId, ActionId), UserAction>,
    tokens: HashMap<TokenUid, TokenRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_entity<E>(table: &mut HashMap<E::Id, E>, row: &E) -> StoreResult<()>
where
    E: Entity + Clone,
{
    if table.contains_key(row.id()) {
        return Err(StoreError::unique("id"));
    }
    table.insert(*row.id(), row.clone());
    Ok(())
}

fn insert_pair<K, V>(table: &mut HashMap<K, V>, key: K, row: &V, field: &str) -> StoreResult<()>
where
    K: Eq + Hash,
    V: Clone,
{
    if table.contains_key(&key) {
        return Err(StoreError::unique(field));
    }
    table.insert(key, row.clone());
    Ok(())
}

fn name_taken<'a, I>(mut names: I, name: &str) -> bool
where
    I: Iterator<Item = &'a str>,
{
    names.any(|n| n == name)
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(name_taken(tables.users.values().map(|u| u.username.as_str()), username))
    }

    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(name_taken(tables.users.values().map(|u| u.email.as_str()), email))
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if name_taken(tables.users.values().map(|u| u.username.as_str()), &user.username) {
            return Err(StoreError::unique("username"));
        }
        if name_taken(tables.users.values().map(|u| u.email.as_str()), &user.email) {
            return Err(StoreError::unique("email"));
        }
        insert_entity(&mut tables.users, user)
    }

    async fn update_user(&self, id: UserId, changes: &UserChanges, at: DateTime<Utc>) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        let others = || tables.users.values().filter(|u| u.id != id);
        if let Some(username) = &changes.username {
            if name_taken(others().map(|u| u.username.as_str()), username) {
                return Err(StoreError::unique("username"));
            }
        }
        if let Some(email) = &changes.email {
            if name_taken(others().map(|u| u.email.as_str()), email) {
                return Err(StoreError::unique("email"));
            }
        }
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.apply(changes, at);
        Ok(user.clone())
    }

    async fn fetch_users(&self, plan: &QueryPlan) -> StoreResult<Vec<User>> {
        Ok(plan.apply(self.tables.read().await.users.values()).0)
    }

    async fn count_users(&self, plan: &QueryPlan) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().filter(|u| plan.matches(*u)).count() as u64)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn role_by_id(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn role_name_exists(&self, name: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(name_taken(tables.roles.values().map(|r| r.name.as_str()), name))
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if name_taken(tables.roles.values().map(|r| r.name.as_str()), &role.name) {
            return Err(StoreError::unique("name"));
        }
        insert_entity(&mut tables.roles, role)
    }

    async fn update_role(&self, id: RoleId, patch: &RolePatch, at: DateTime<Utc>) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(name) = &patch.name {
            let others = tables.roles.values().filter(|r| r.id != id);
            if name_taken(others.map(|r| r.name.as_str()), name) {
                return Err(StoreError::unique("name"));
            }
        }
        let role = tables.roles.get_mut(&id).ok_or(StoreError::NotFound)?;
        role.apply(patch, at);
        Ok(role.clone())
    }

    async fn fetch_roles(&self, plan: &QueryPlan) -> StoreResult<Vec<Role>> {
        Ok(plan.apply(self.tables.read().await.roles.values()).0)
    }

    async fn count_roles(&self, plan: &QueryPlan) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().filter(|r| plan.matches(*r)).count() as u64)
    }
}

#[async_trait]
impl ActionStore for InMemoryStore {
    async fn action_by_id(&self, id: ActionId) -> StoreResult<Option<Action>> {
        Ok(self.tables.read().await.actions.get(&id).cloned())
    }

    async fn action_by_name(&self, name: &str) -> StoreResult<Option<Action>> {
        let tables = self.tables.read().await;
        Ok(tables.actions.values().find(|a| a.name == name).cloned())
    }

    async fn action_name_exists(&self, name: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(name_taken(tables.actions.values().map(|a| a.name.as_str()), name))
    }

    async fn insert_action(&self, action: &Action) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if name_taken(tables.actions.values().map(|a| a.name.as_str()), &action.name) {
            return Err(StoreError::unique("name"));
        }
        insert_entity(&mut tables.actions, action)
    }

    async fn update_action(&self, id: ActionId, patch: &ActionPatch, at: DateTime<Utc>) -> StoreResult<Action> {
        let mut tables = self.tables.write().await;
        if !tables.actions.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(name) = &patch.name {
            let others = tables.actions.values().filter(|a| a.id != id);
            if name_taken(others.map(|a| a.name.as_str()), name) {
                return Err(StoreError::unique("name"));
            }
        }
        let action = tables.actions.get_mut(&id).ok_or(StoreError::NotFound)?;
        action.apply(patch, at);
        Ok(action.clone())
    }

    async fn fetch_actions(&self, plan: &QueryPlan) -> StoreResult<Vec<Action>> {
        Ok(plan.apply(self.tables.read().await.actions.values()).0)
    }

    async fn count_actions(&self, plan: &QueryPlan) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.actions.values().filter(|a| plan.matches(*a)).count() as u64)
    }
}

#[async_trait]
impl GrantStore for InMemoryStore {
    async fn insert_user_role(&self, grant: &UserRole) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&grant.user_id) || !tables.roles.contains_key(&grant.role_id) {
            return Err(StoreError::NotFound);
        }
        insert_pair(&mut tables.user_roles, (grant.user_id, grant.role_id), grant, "role_id")
    }

    async fn delete_user_role(&self, user_id: UserId, role_id: RoleId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_roles.remove(&(user_id, role_id)).is_some())
    }

    async fn insert_role_action(&self, grant: &RoleAction) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&grant.role_id) || !tables.actions.contains_key(&grant.action_id) {
            return Err(StoreError::NotFound);
        }
        insert_pair(&mut tables.role_actions, (grant.role_id, grant.action_id), grant, "action_id")
    }

    async fn delete_role_action(&self, role_id: RoleId, action_id: ActionId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.role_actions.remove(&(role_id, action_id)).is_some())
    }

    async fn insert_user_action(&self, grant: &UserAction) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&grant.user_id) || !tables.actions.contains_key(&grant.action_id) {
            return Err(StoreError::NotFound);
        }
        insert_pair(&mut tables.user_actions, (grant.user_id, grant.action_id), grant, "action_id")
    }

    async fn delete_user_action(&self, user_id: UserId, action_id: ActionId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_actions.remove(&(user_id, action_id)).is_some())
    }

    async fn direct_actions(&self, user_id: UserId) -> StoreResult<Vec<Action>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_actions
            .keys()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, aid)| tables.actions.get(aid).cloned())
            .collect())
    }

    async fn role_grants(&self, user_id: UserId) -> StoreResult<Vec<RoleGrant>> {
        let tables = self.tables.read().await;
        let mut grants: Vec<RoleGrant> = tables
            .user_roles
            .keys()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| tables.roles.get(rid))
            .map(|role| RoleGrant {
                role: role.clone(),
                actions: tables
                    .role_actions
                    .keys()
                    .filter(|(rid, _)| *rid == role.id)
                    .filter_map(|(_, aid)| tables.actions.get(aid).cloned())
                    .collect(),
            })
            .collect();
        grants.sort_by(|a, b| a.role.name.cmp(&b.role.name));
        Ok(grants)
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn insert_token(&self, record: &TokenRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        insert_pair(&mut tables.tokens, record.uid, record, "uid")
    }

    async fn token_by_uid(&self, uid: TokenUid) -> StoreResult<Option<TokenRecord>> {
        Ok(self.tables.read().await.tokens.get(&uid).cloned())
    }
}
