//! Password credential hashing.
//!
//! Hashes are Argon2id in PHC string form, salted per credential. Hashing
//! always happens outside store transactions, and the async entry points
//! run it on the blocking pool so request tasks keep moving.

use std::fmt;
use std::sync::{Arc, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use bizops_core::config::PasswordSettings;

use crate::{Error, Result};

/// Hashes and verifies password credentials.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: OnceLock<Option<String>>,
}

impl CredentialHasher {
    /// Build a hasher with the configured cost.
    pub fn new(settings: &PasswordSettings) -> Result<Self> {
        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: OnceLock::new(),
        })
    }

    /// Hash a new password.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(Error::validation_field("password", "must not be empty"));
        }
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::PasswordHash(e.to_string()))
    }

    /// Check `password` against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch and an error only if the stored hash
    /// cannot be parsed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::PasswordHash(e.to_string())),
        }
    }

    /// Spend the same work as a real verification.
    ///
    /// Used when there is no stored hash to check against, so failed logins
    /// for unknown or password-less accounts take as long as wrong passwords.
    pub fn verify_decoy(&self, password: &str) {
        let decoy = self
            .decoy
            .get_or_init(|| self.hash("bizops-decoy-credential").ok());
        if let Some(hash) = decoy {
            let _ = self.verify(password, hash);
        }
    }
}

// ============================================================================
// Blocking-pool entry points
// ============================================================================

fn join_error(err: tokio::task::JoinError) -> Error {
    Error::PasswordHash(format!("hashing task failed: {err}"))
}

impl CredentialHasher {
    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_async(self: &Arc<Self>, password: &str) -> Result<String> {
        let hasher = Arc::clone(self);
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(join_error)?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_async(self: &Arc<Self>, password: &str, hash: &str) -> Result<bool> {
        let hasher = Arc::clone(self);
        let (password, hash) = (password.to_owned(), hash.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(join_error)?
    }

    /// [`verify_decoy`](Self::verify_decoy) on the blocking pool.
    pub async fn verify_decoy_async(self: &Arc<Self>, password: &str) {
        let hasher = Arc::clone(self);
        let password = password.to_owned();
        if let Err(e) = tokio::task::spawn_blocking(move || hasher.verify_decoy(&password)).await {
            tracing::warn!(error = %e, "decoy verification task failed");
        }
    }
}

impl fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}
