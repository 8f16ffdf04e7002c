//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};

/// Stored entity with a stable identifier and creation time.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// When the entity was first stored.
    fn created_at(&self) -> DateTime<Utc>;
}
