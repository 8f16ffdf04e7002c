use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{Entity, FieldViolations, RoleId, ServiceResult};

use crate::validate;

/// Named, reusable bundle of actions assignable to users.
///
/// Names are case-sensitive and unique. Deactivating a role removes its
/// actions from every subsequent permission resolution, but the role itself
/// stays readable by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Role {
    pub fn apply(&mut self, patch: &RolePatch, at: DateTime<Utc>) {
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
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewRole {
    pub fn validate(&self) -> ServiceResult<()> {
        let mut v = FieldViolations::new();
        validate::name(&mut v, "name", &self.name);
        validate::description(&mut v, &self.description);
        v.into_result()
    }
}

/// Partial update for a role. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl RolePatch {
    pub fn validate(&self) -> ServiceResult<()> {
        let mut v = FieldViolations::new();
        if let Some(name) = &self.name {
            validate::name(&mut v, "name", name);
        }
        if let Some(description) = &self.description {
            validate::description(&mut v, description);
        }
        v.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_role_requires_name() {
        let role = NewRole {
            name: String::new(),
            description: String::new(),
            active: true,
        };
        assert!(role.validate().is_err());
    }

    #[test]
    fn deactivating_keeps_identity() {
        let now = Utc::now();
        let mut role = Role {
            id: RoleId::new(),
            name: "auditor".to_string(),
            description: String::new(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        let id = role.id;
        role.apply(
            &RolePatch {
                active: Some(false),
                ..Default::default()
            },
            now,
        );
        assert!(!role.active);
        assert_eq!(role.id, id);
        assert_eq!(role.name, "auditor");
    }
}
