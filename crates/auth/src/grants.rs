//! Association records linking users, roles and actions.
//!
//! Each `(left, right)` pair is unique per association table. The store's
//! unique index enforces this; nothing here re-derives it in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{ActionId, GrantId, RoleId, UserId};

use crate::{Action, Role};

/// User is a member of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: GrantId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
}

/// Role grants an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAction {
    pub id: GrantId,
    pub role_id: RoleId,
    pub action_id: ActionId,
    pub created_at: DateTime<Utc>,
}

/// Action granted directly to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAction {
    pub id: GrantId,
    pub user_id: UserId,
    pub action_id: ActionId,
    pub created_at: DateTime<Utc>,
}

/// A role held by a user together with every action that role grants.
///
/// Inactive roles and actions are included; filtering happens when the
/// effective permission set is merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: Role,
    pub actions: Vec<Action>,
}
