//! `warden-core`: foundation building blocks shared by every warden crate.
//!
//! This crate contains identifiers, the service error taxonomy and the clock
//! seam. It performs no IO.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{CredentialFailure, FieldErrors, FieldViolations, ServiceError, ServiceResult};
pub use id::{ActionId, GrantId, RoleId, TokenUid, UserId};
