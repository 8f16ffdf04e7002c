//! User model: the principal that logs in and carries grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{Entity, FieldViolations, ServiceResult, UserId};

use crate::validate;

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A human or service principal.
///
/// # Invariants
/// - `username` and `email` are unique across all users (store-enforced).
/// - `active == false` users cannot log in; they remain readable by id.
/// - Users are never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub active: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl User {
    /// Apply a store-level change set in place.
    pub fn apply(&mut self, changes: &UserChanges, at: DateTime<Utc>) {
        if let Some(v) = &changes.full_name {
            self.full_name = v.clone();
        }
        if let Some(v) = &changes.username {
            self.username = v.clone();
        }
        if let Some(v) = &changes.email {
            self.email = v.clone();
        }
        if let Some(v) = &changes.password_hash {
            self.password_hash = v.clone();
        }
        if let Some(v) = changes.active {
            self.active = v;
        }
        if let Some(v) = changes.verified {
            self.verified = v;
        }
        self.updated_at = at;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub verified: bool,
}

fn default_active() -> bool {
    true
}

impl NewUser {
    /// Trim the display name and lowercase the email. Usernames stay
    /// case-sensitive.
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }

    pub fn validate(&self) -> ServiceResult<()> {
        let mut v = FieldViolations::new();
        validate::full_name(&mut v, &self.full_name);
        validate::username(&mut v, &self.username);
        validate::email(&mut v, &self.email);
        validate::password(&mut v, &self.password);
        v.into_result()
    }
}

/// Partial update for a user. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub active: Option<bool>,
    pub verified: Option<bool>,
}

impl UserPatch {
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.map(|v| v.trim().to_string());
        self.email = self.email.map(|v| v.trim().to_lowercase());
        self
    }

    pub fn validate(&self) -> ServiceResult<()> {
        let mut v = FieldViolations::new();
        if let Some(full_name) = &self.full_name {
            validate::full_name(&mut v, full_name);
        }
        if let Some(username) = &self.username {
            validate::username(&mut v, username);
        }
        if let Some(email) = &self.email {
            validate::email(&mut v, email);
        }
        if let Some(password) = &self.password {
            validate::password(&mut v, password);
        }
        v.into_result()
    }
}

/// Store-level change set: the password is already hashed and unchanged
/// fields have been dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub active: Option<bool>,
    pub verified: Option<bool>,
}
