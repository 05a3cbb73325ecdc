//! Per-tenant database handles for isolated storage
//!
//! Each tenant's receipts live in their own file under the data directory.
//! Handles are opened lazily on first use and cached by tenant id. Deleting a
//! tenant closes the cached handle before the file is removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{Database, Schema};
use crate::error::{Error, Result};

/// Directory (under the data dir) that holds tenant files
pub const TENANTS_DIR: &str = "tenants";

/// Registry of open tenant databases
pub struct TenantRegistry {
    root: PathBuf,
    passphrase: Option<String>,
    handles: Mutex<HashMap<i64, Database>>,
}

impl TenantRegistry {
    /// Create a registry rooted at `<data_dir>/tenants`
    ///
    /// `passphrase` is the encryption passphrase shared by every tenant file;
    /// `None` opens them unencrypted.
    pub fn new(data_dir: &Path, passphrase: Option<String>) -> Result<Self> {
        let root = data_dir.join(TENANTS_DIR);
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            passphrase,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// File name for a tenant's database
    ///
    /// The readable part keeps only `[a-z0-9_-]`, so the digest of the full
    /// username keeps distinct names from colliding.
    pub fn db_file_name(username: &str) -> String {
        let slug: String = username
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .take(32)
            .collect();
        let digest = hex::encode(Sha256::digest(username.as_bytes()));
        format!("{}_{}.db", slug, &digest[..12])
    }

    /// Full path of a tenant's database file
    pub fn db_path(&self, username: &str) -> PathBuf {
        self.root.join(Self::db_file_name(username))
    }

    /// Get the tenant's database, opening (and migrating) it on first use
    pub fn open(&self, tenant_id: i64, username: &str) -> Result<Database> {
        if let Some(db) = self.lock()?.get(&tenant_id) {
            return Ok(db.clone());
        }

        let path = self.db_path(username);
        let path_str = path.to_string_lossy().to_string();
        let db = Database::new_with_key(&path_str, Schema::Tenant, self.passphrase.as_deref())?;
        debug!(tenant_id, path = %path_str, "Tenant database opened");

        // Another caller may have opened it meanwhile; keep the first handle
        let db = self.lock()?.entry(tenant_id).or_insert(db).clone();
        Ok(db)
    }

    /// Create an empty database file for a newly registered tenant
    ///
    /// A file left at the tenant's path (from an earlier account with the same
    /// username) is removed first; failing to remove it fails provisioning.
    pub fn provision(&self, tenant_id: i64, username: &str) -> Result<()> {
        let stale = self.lock()?.remove(&tenant_id);
        drop(stale);

        if self.remove_files(username)? {
            warn!(tenant_id, "Removed leftover tenant database before provisioning");
        }
        self.open(tenant_id, username).map(|_| ())
    }

    /// Drop the cached handle and delete the tenant's files
    ///
    /// Missing files are not an error.
    pub fn close_and_remove(&self, tenant_id: i64, username: &str) -> Result<()> {
        // Dropping the last Database clone closes its pooled connections
        let removed = self.lock()?.remove(&tenant_id);
        drop(removed);

        self.remove_files(username)?;
        info!(tenant_id, "Tenant storage removed");
        Ok(())
    }

    /// Delete the database file and its WAL/SHM sidecars, reporting whether
    /// anything was there
    fn remove_files(&self, username: &str) -> Result<bool> {
        let path = self.db_path(username);
        let mut found = false;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            match std::fs::remove_file(&file) {
                Ok(()) => found = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = ?file, error = %e, "Failed to remove tenant file");
                    return Err(e.into());
                }
            }
        }
        Ok(found)
    }

    /// Number of currently cached handles
    #[cfg(test)]
    fn open_count(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, Database>>> {
        self.handles
            .lock()
            .map_err(|_| Error::InvalidData("tenant registry lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Partition;
    use crate::models::ExtractedReceipt;
    use tempfile::TempDir;

    fn sample_receipt() -> ExtractedReceipt {
        ExtractedReceipt {
            merchant_id: "11.111.111/0001-11".into(),
            issued_at: "2024-01-01".into(),
            document: serde_json::json!({ "CNPJ": "11.111.111/0001-11" }),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_db_file_name_is_stable_and_distinct() {
        let a = TenantRegistry::db_file_name("alice");
        assert_eq!(a, TenantRegistry::db_file_name("alice"));
        assert!(a.starts_with("alice_"));
        assert!(a.ends_with(".db"));

        // Same slug, different usernames
        let x = TenantRegistry::db_file_name("joão");
        let y = TenantRegistry::db_file_name("jo_o");
        assert_ne!(x, y);
    }

    #[test]
    fn test_open_caches_handle() {
        let dir = TempDir::new().unwrap();
        let registry = TenantRegistry::new(dir.path(), None).unwrap();

        registry.provision(1, "alice").unwrap();
        assert!(registry.db_path("alice").exists());
        assert_eq!(registry.open_count(), 1);

        registry.open(1, "alice").unwrap();
        assert_eq!(registry.open_count(), 1);
    }

    #[test]
    fn test_close_and_remove() {
        let dir = TempDir::new().unwrap();
        let registry = TenantRegistry::new(dir.path(), None).unwrap();

        registry.provision(7, "bob").unwrap();
        registry.close_and_remove(7, "bob").unwrap();

        assert_eq!(registry.open_count(), 0);
        assert!(!registry.db_path("bob").exists());

        // Removing again is fine
        registry.close_and_remove(7, "bob").unwrap();
    }

    #[test]
    fn test_provision_replaces_leftover_file() {
        let dir = TempDir::new().unwrap();
        let registry = TenantRegistry::new(dir.path(), None).unwrap();

        // A file from an earlier "carol" whose removal never happened
        let path = registry.db_path("carol");
        let old = Database::new_with_key(&path.to_string_lossy(), Schema::Tenant, None).unwrap();
        old.save_receipt(Partition::Whole, &sample_receipt()).unwrap();
        drop(old);

        registry.provision(3, "carol").unwrap();
        let db = registry.open(3, "carol").unwrap();
        assert!(db.list_receipts(Partition::Whole).unwrap().is_empty());
    }

    #[test]
    fn test_provision_fails_when_leftover_cannot_be_removed() {
        let dir = TempDir::new().unwrap();
        let registry = TenantRegistry::new(dir.path(), None).unwrap();

        // A directory at the file path cannot be removed with remove_file
        std::fs::create_dir(registry.db_path("dave")).unwrap();

        assert!(registry.provision(4, "dave").is_err());
        assert_eq!(registry.open_count(), 0);
    }
}
