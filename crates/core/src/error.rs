//! Service error model.

use std::collections::BTreeMap;

use thiserror::Error;

/// Field name → human-readable message, ordered by field name.
pub type FieldErrors = BTreeMap<String, String>;

/// Result type used across the service layer.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Why a credential (password or token) was rejected.
///
/// Kept for logs and metrics only. The HTTP layer collapses every variant into
/// the same response so callers cannot probe which check failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("bad username or password")]
    BadPassword,

    #[error("account is inactive")]
    InactiveAccount,
}

/// Service-level error.
///
/// Every operation exposed to the transport layer returns this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Input failed syntactic or semantic validation.
    #[error("validation failed: {}", describe(.0))]
    ValidationFailed(FieldErrors),

    /// One or more unique fields collide with existing data.
    #[error("duplicate data: {}", describe(.0))]
    DuplicateData(FieldErrors),

    #[error("data not found")]
    DataNotFound,

    #[error("invalid credential: {0}")]
    InvalidCredential(CredentialFailure),

    #[error("missing credential")]
    MissingCredential,

    /// Token is valid but does not carry the required action.
    #[error("permission denied: missing action '{0}'")]
    PermissionDenied(String),

    #[error("request cancelled")]
    RequestCancelled,

    /// A filter or sort key outside the entity's allow-list.
    #[error("query field not allowed: {0}")]
    QueryFieldNotAllowed(String),

    /// The backing store failed. The payload is for logs, never for callers.
    #[error("store failure")]
    StoreFailure(String),

    /// Signing or hashing failed. The payload is for logs, never for callers.
    #[error("internal error")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed(FieldErrors::from([(field.into(), message.into())]))
    }

    pub fn duplicate(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = already_exists(&field);
        Self::DuplicateData(FieldErrors::from([(field, message)]))
    }

    pub fn invalid_credential(failure: CredentialFailure) -> Self {
        Self::InvalidCredential(failure)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors the caller may surface verbatim (per-field details).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::StoreFailure(_) | Self::Internal(_))
    }
}

/// Message used for every duplicate field, whether the conflict was found by
/// a pre-check or by the store's unique index.
pub fn already_exists(field: &str) -> String {
    format!("{field} already exists")
}

fn describe(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Accumulates per-field validation messages.
///
/// The first message recorded for a field wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldViolations(FieldErrors);

impl FieldViolations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_error(self) -> ServiceError {
        ServiceError::ValidationFailed(self.0)
    }

    pub fn into_result(self) -> ServiceResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}
