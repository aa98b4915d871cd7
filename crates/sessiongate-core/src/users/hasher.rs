use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};

use crate::error::HashError;

/// One-way password digests.
pub trait Hasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// `false` for a wrong secret and for a digest that can't be parsed.
    fn verify(&self, secret: &str, digest: &str) -> bool;
}

/// Argon2id producing PHC strings (`$argon2id$v=19$...`).
///
/// Parameters are encoded in each digest, so digests made with different
/// settings still verify.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost: memory in KiB, iterations, lanes.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, HashError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Hasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let phc = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?;
        Ok(phc.to_string())
    }

    fn verify(&self, secret: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self.argon2().verify_password(secret.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    // Minimum cost keeps the test suite fast
    Argon2Hasher::with_params(8, 1, 1).unwrap()
}
