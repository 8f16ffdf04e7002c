//! `warden-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! entity models and their validation, permission merging, token claims,
//! signing/verification and password hashing.

pub mod actions;
pub mod authorize;
pub mod claims;
pub mod grants;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod token;
pub mod user;
mod validate;

pub use actions::{Action, ActionPatch, NewAction};
pub use authorize::{authorize, holds_action, require_action};
pub use claims::{TokenClaims, TokenUse, validate_claims};
pub use grants::{RoleAction, RoleGrant, UserAction, UserRole};
pub use jwt::{TokenAuthenticator, TokenKeys};
pub use password::{Argon2Hasher, PasswordHasher};
pub use permissions::EffectivePermissionSet;
pub use roles::{NewRole, Role, RolePatch};
pub use token::{RequestMetadata, TokenRecord};
pub use user::{NewUser, User, UserChanges, UserPatch};
