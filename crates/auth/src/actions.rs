use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{ActionId, Entity, FieldViolations, ServiceResult};

use crate::validate;

/// Atomic, named capability (e.g. `"users.read"`).
///
/// Action names are opaque, case-sensitive strings; there are no wildcards
/// or hierarchies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Action {
    type Id = ActionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Action {
    pub fn apply(&mut self, patch: &ActionPatch, at: DateTime<Utc>) {
        if let Some(v) = &patch.name {
            self.name = v.clone();
        }
        if let Some(v) = &patch.description {
            self.description = v.clone();
        }
        if let Some(v) = patch.active {
            self.active = v;
        }
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewAction {
    pub fn validate(&self) -> ServiceResult<()> {
        let mut v = FieldViolations::new();
        validate::name(&mut v, "name", &self.name);
        if self.name.contains(char::is_whitespace) {
            v.add("name", "must not contain whitespace");
        }
        validate::description(&mut v, &self.description);
        v.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl ActionPatch {
    pub fn validate(&self) -> ServiceResult<()> {
        let mut v = FieldViolations::new();
        if let Some(name) = &self.name {
            validate::name(&mut v, "name", name);
            if name.contains(char::is_whitespace) {
                v.add("name", "must not contain whitespace");
            }
        }
        if let Some(description) = &self.description {
            validate::description(&mut v, description);
        }
        v.into_result()
    }
}

/// Actions guarding warden's own administrative operations.
pub mod builtin {
    pub const USERS_READ: &str = "users.read";
    pub const USERS_WRITE: &str = "users.write";
    pub const ROLES_READ: &str = "roles.read";
    pub const ROLES_WRITE: &str = "roles.write";
    pub const ACTIONS_READ: &str = "actions.read";
    pub const ACTIONS_WRITE: &str = "actions.write";
    pub const GRANTS_WRITE: &str = "grants.write";

    pub const ALL: &[&str] = &[
        USERS_READ,
        USERS_WRITE,
        ROLES_READ,
        ROLES_WRITE,
        ACTIONS_READ,
        ACTIONS_WRITE,
        GRANTS_WRITE,
    ];
}
