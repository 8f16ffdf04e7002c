//! Password hashing off the async executor.

use std::sync::Arc;

use warden_auth::PasswordHasher;
use warden_core::{ServiceError, ServiceResult};

pub(crate) async fn hash_password(hasher: Arc<dyn PasswordHasher>, password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ServiceError::internal(format!("hash task failed: {e}")))?
}

pub(crate) async fn verify_password(
    hasher: Arc<dyn PasswordHasher>,
    digest: String,
    password: String,
) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
        .await
        .map_err(|e| ServiceError::internal(format!("verify task failed: {e}")))
}
