//! Password hashing using Argon2id
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`), so
//! every stored hash carries its own salt and cost parameters and keeps
//! verifying after the configured cost changes.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use tracing::debug;

use crate::error::AuthError;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Password hashing service
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    /// Create a password service with the given cost parameters
    pub fn new(params: HashingParams) -> Result<Self, AuthError> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| AuthError::PasswordHash(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    }

    /// Verify a password against a stored hash
    ///
    /// Salt and cost come from the hash itself. A hash that cannot be
    /// parsed verifies as `false`.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Rejecting malformed password hash: {}", e);
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> PasswordService {
    PasswordService::new(HashingParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let service = test_service();
        for password in ["senha123", "", "with:colon", "ünïcödé 🔑"] {
            let hash = service.hash(password).unwrap();
            assert!(service.verify(password, &hash), "failed for {:?}", password);
        }
    }

    #[test]
    fn test_wrong_password_fails() {
        let service = test_service();
        let hash = service.hash("senha123").unwrap();

        assert!(!service.verify("senha124", &hash));
        assert!(!service.verify("", &hash));
        assert!(!service.verify("SENHA123", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let service = test_service();
        let first = service.hash("senha123").unwrap();
        let second = service.hash("senha123").unwrap();

        assert_ne!(first, second);
        assert!(service.verify("senha123", &first));
        assert!(service.verify("senha123", &second));
    }

    #[test]
    fn test_hash_encodes_algorithm_and_cost() {
        let hash = test_service().hash("senha123").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=64,t=1,p=1$"), "got {}", hash);
    }

    #[test]
    fn test_verify_uses_cost_embedded_in_hash() {
        let cheap = test_service().hash("senha123").unwrap();
        let costly = PasswordService::new(HashingParams {
            memory_kib: 128,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();

        assert!(costly.verify("senha123", &cheap));
    }

    #[test]
    fn test_malformed_hash_is_false_not_error() {
        let service = test_service();
        assert!(!service.verify("senha123", ""));
        assert!(!service.verify("senha123", "not-a-hash"));
        assert!(!service.verify("senha123", "$argon2id$v=19$garbage"));
        assert!(!service.verify(
            "senha123",
            "$2a$10$qL3in5bAlEM3oeaK9BWBLuZcB4Nh0zqN0VJ2a6XoUwV8m.NbMbOC6"
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = PasswordService::new(HashingParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::PasswordHash(_))));
    }
}
