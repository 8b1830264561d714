//! Argon2id password hashing for character accounts.

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use thiserror::Error;

use crate::config::SecurityConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hash failure: {0}")]
    Hash(String),
}

#[derive(Clone)]
pub struct PasswordVault {
    argon2: Argon2<'static>,
}

impl Default for PasswordVault {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordVault {
    /// Uses the configured Argon2 cost parameters, falling back to the
    /// library defaults for anything unset or invalid.
    pub fn from_config(cfg: &SecurityConfig) -> Self {
        let Some(a) = &cfg.argon2 else {
            return Self::default();
        };
        let defaults = Params::DEFAULT;
        let params = Params::new(
            a.memory_kib.unwrap_or(defaults.m_cost()),
            a.time_cost.unwrap_or(defaults.t_cost()),
            a.parallelism.unwrap_or(defaults.p_cost()),
            None,
        );
        match params {
            Ok(p) => Self {
                argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, p),
            },
            Err(e) => {
                log::warn!("Invalid argon2 parameters ({}); using defaults", e);
                Self::default()
            }
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    /// False for a wrong password and for an unparseable stored hash.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self.argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                log::warn!("Corrupt password hash: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Argon2Config;

    fn cheap() -> PasswordVault {
        PasswordVault::from_config(&SecurityConfig {
            argon2: Some(Argon2Config {
                memory_kib: Some(1024),
                time_cost: Some(1),
                parallelism: Some(1),
            }),
        })
    }

    #[test]
    fn hash_then_verify() {
        let vault = cheap();
        let hash = vault.hash("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(vault.verify("hunter22", &hash));
        assert!(!vault.verify("hunter23", &hash));
    }

    #[test]
    fn corrupt_hash_never_verifies() {
        assert!(!cheap().verify("anything", "not-a-hash"));
    }
}
