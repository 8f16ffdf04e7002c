//! Concurrent uniqueness pre-checks for create and update.
//!
//! The checks are an early exit only. Two creators can both pass them, so
//! the store's unique index stays authoritative and a unique violation on
//! insert is reported with the same `DuplicateData` shape.

use futures::future::{BoxFuture, try_join_all};

use warden_core::{FieldErrors, ServiceError, ServiceResult, error::already_exists};

use crate::store::StoreResult;

/// One uniqueness dimension: a field name and a probe answering "is this
/// value already taken?".
pub struct UniquenessCheck<'a> {
    field: &'static str,
    probe: BoxFuture<'a, StoreResult<bool>>,
}

impl<'a> UniquenessCheck<'a> {
    pub fn new(field: &'static str, probe: BoxFuture<'a, StoreResult<bool>>) -> Self {
        Self { field, probe }
    }
}

/// Run every check concurrently and collect the conflicting fields.
///
/// A store failure in any probe fails the whole call immediately; the other
/// probes are dropped.
pub async fn ensure_unique(checks: Vec<UniquenessCheck<'_>>) -> ServiceResult<()> {
    if checks.is_empty() {
        return Ok(());
    }

    let outcomes = try_join_all(checks.into_iter().map(|check| async move {
        check.probe.await.map(|taken| (check.field, taken))
    }))
    .await?;

    let conflicts: FieldErrors = outcomes
        .into_iter()
        .filter(|(_, taken)| *taken)
        .map(|(field, _)| (field.to_string(), already_exists(field)))
        .collect();

    if conflicts.is_empty() {
        Ok(())
    } else {
        tracing::debug!(conflicts = ?conflicts.keys().collect::<Vec<_>>(), "uniqueness pre-check failed");
        Err(ServiceError::DuplicateData(conflicts))
    }
}
