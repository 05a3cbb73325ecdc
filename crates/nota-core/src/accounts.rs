//! Account store: enrollment, credential checks, deletion
//!
//! Passwords are stored as Argon2id PHC strings. Login reports a mismatch as
//! `None`, never as an error.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::Tenant;

/// Message for a wrong enrollment passphrase
pub const ENROLLMENT_REJECTED: &str = "Senha comum incorreta. Registro não permitido.";

/// Message when no enrollment passphrase is configured
pub const ENROLLMENT_DISABLED: &str = "Registro desativado: nenhuma senha comum configurada.";

/// Hash a password into a PHC string with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Password(format!("hashing failed: {}", e)))
}

/// Verify a password against a stored PHC string
///
/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| Error::Password(format!("invalid hash format: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Password(format!("verify error: {}", e))),
    }
}

/// Accounts table plus the enrollment rule
#[derive(Clone)]
pub struct AccountStore {
    db: Database,
    enrollment_passphrase: String,
}

impl AccountStore {
    /// `db` must carry the accounts table (shared or accounts schema)
    pub fn new(db: Database, enrollment_passphrase: impl Into<String>) -> Self {
        Self {
            db,
            enrollment_passphrase: enrollment_passphrase.into(),
        }
    }

    /// Create an account, returning its tenant id
    ///
    /// Checks the enrollment passphrase first, then username uniqueness.
    /// An empty configured passphrase closes registration entirely.
    pub fn register(&self, username: &str, password: &str, shared_secret: &str) -> Result<i64> {
        if self.enrollment_passphrase.is_empty() {
            warn!("Registration attempted with no enrollment passphrase configured");
            return Err(Error::Authorization(ENROLLMENT_DISABLED.to_string()));
        }
        if shared_secret != self.enrollment_passphrase {
            return Err(Error::Authorization(ENROLLMENT_REJECTED.to_string()));
        }
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::InvalidData(
                "Usuário e senha não podem ser vazios.".to_string(),
            ));
        }

        let hash = hash_password(password)?;
        let id = self.db.insert_user(username, &hash)?;
        info!(tenant_id = id, "Account registered");
        Ok(id)
    }

    /// Check credentials
    pub fn login(&self, username: &str, password: &str) -> Result<Option<Tenant>> {
        let Some((id, hash)) = self.db.get_user_credentials(username)? else {
            debug!("Login for unknown username");
            return Ok(None);
        };
        if !verify_password(password, &hash)? {
            debug!(tenant_id = id, "Login with wrong password");
            return Ok(None);
        }
        self.db.get_user(id)
    }

    pub fn get(&self, tenant_id: i64) -> Result<Option<Tenant>> {
        self.db.get_user(tenant_id)
    }

    pub fn list(&self) -> Result<Vec<Tenant>> {
        self.db.list_users()
    }

    /// Remove the account row (and, in a shared file, its receipts)
    pub fn delete(&self, tenant_id: i64) -> Result<bool> {
        let removed = self.db.delete_user(tenant_id)?;
        if removed {
            info!(tenant_id, "Account deleted");
        }
        Ok(removed)
    }
}
