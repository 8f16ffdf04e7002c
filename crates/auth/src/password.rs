use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use warden_core::{ServiceError, ServiceResult};

/// One-way password digests.
///
/// Implementations are CPU-bound; async callers should run them on a
/// blocking thread.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, secret: &str) -> ServiceResult<String>;

    /// False on mismatch and on an unparseable digest.
    fn verify(&self, digest: &str, secret: &str) -> bool;
}

/// Argon2id (v0x13) hasher producing PHC-format digests.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// `cost` is the iteration count; memory and parallelism use the
    /// library defaults.
    pub fn new(cost: u32) -> ServiceResult<Self> {
        Self::with_params(Params::DEFAULT_M_COST, cost)
    }

    pub fn with_params(memory_kib: u32, iterations: u32) -> ServiceResult<Self> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| ServiceError::internal(format!("invalid argon2 params: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> ServiceResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, digest: &str, secret: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            tracing::warn!("stored password digest is not valid PHC");
            return false;
        };
        // Parameters come from the digest itself, so older costs still verify.
        self.argon2()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Hasher {
        Argon2Hasher::with_params(256, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = cheap();
        let digest = hasher.hash("correct horse").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify(&digest, "correct horse"));
        assert!(!hasher.verify(&digest, "correct h0rse"));
    }

    #[test]
    fn salts_differ_per_hash() {
        let hasher = cheap();
        let a = hasher.hash("secret-secret").unwrap();
        let b = hasher.hash("secret-secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_digest_never_verifies() {
        assert!(!cheap().verify("plaintext", "plaintext"));
    }

    #[test]
    fn digest_from_other_cost_still_verifies() {
        let digest = Argon2Hasher::with_params(512, 2).unwrap().hash("pw-12345").unwrap();
        assert!(cheap().verify(&digest, "pw-12345"));
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(Argon2Hasher::new(0).is_err());
    }
}
