//! Storage layout: one shared file, or an accounts file plus one file per tenant
//!
//! Everything above this module asks for "the receipts of tenant N" and gets
//! back a `Database` plus the `Partition` to query it with, regardless of mode.

use std::path::Path;

use tracing::info;

use crate::config::StorageConfig;
use crate::db::{Database, Partition, Schema, TenantRegistry};
use crate::error::Result;
use crate::models::StorageMode;

/// Opened storage for the configured mode
pub enum Storage {
    Shared {
        db: Database,
    },
    Isolated {
        accounts: Database,
        tenants: TenantRegistry,
    },
}

impl Storage {
    /// Open (creating when missing) the files for `config.mode`
    ///
    /// `db_passphrase` encrypts every file with SQLCipher; `None` leaves them
    /// in plain SQLite.
    pub fn open(config: &StorageConfig, db_passphrase: Option<String>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.database_path();
        let path_str = path.to_string_lossy().to_string();

        let storage = match config.mode {
            StorageMode::Shared => Storage::Shared {
                db: Database::new_with_key(&path_str, Schema::Shared, db_passphrase.as_deref())?,
            },
            StorageMode::Isolated => Storage::Isolated {
                accounts: Database::new_with_key(
                    &path_str,
                    Schema::Accounts,
                    db_passphrase.as_deref(),
                )?,
                tenants: TenantRegistry::new(&config.data_dir, db_passphrase)?,
            },
        };

        info!(mode = config.mode.as_str(), path = %path_str, "Storage opened");
        Ok(storage)
    }

    /// Unencrypted storage under `data_dir` (tests and `--no-encrypt`)
    pub fn open_unencrypted(mode: StorageMode, data_dir: &Path) -> Result<Self> {
        let config = StorageConfig {
            mode,
            data_dir: data_dir.to_path_buf(),
            database: "nota.db".to_string(),
        };
        Self::open(&config, None)
    }

    pub fn mode(&self) -> StorageMode {
        match self {
            Storage::Shared { .. } => StorageMode::Shared,
            Storage::Isolated { .. } => StorageMode::Isolated,
        }
    }

    /// The database holding the accounts table
    pub fn accounts(&self) -> &Database {
        match self {
            Storage::Shared { db } => db,
            Storage::Isolated { accounts, .. } => accounts,
        }
    }

    /// Database and partition holding one tenant's receipts
    pub fn receipts_for(&self, tenant_id: i64, username: &str) -> Result<(Database, Partition)> {
        match self {
            Storage::Shared { db } => Ok((db.clone(), Partition::Owner(tenant_id))),
            Storage::Isolated { tenants, .. } => {
                Ok((tenants.open(tenant_id, username)?, Partition::Whole))
            }
        }
    }

    /// Prepare receipt storage for a freshly registered tenant
    pub fn provision(&self, tenant_id: i64, username: &str) -> Result<()> {
        match self {
            Storage::Shared { .. } => Ok(()),
            Storage::Isolated { tenants, .. } => tenants.provision(tenant_id, username),
        }
    }

    /// Remove a tenant's receipt storage
    ///
    /// In shared mode the rows go with the account row; see `Database::delete_user`.
    pub fn remove_tenant(&self, tenant_id: i64, username: &str) -> Result<()> {
        match self {
            Storage::Shared { .. } => Ok(()),
            Storage::Isolated { tenants, .. } => tenants.close_and_remove(tenant_id, username),
        }
    }

    /// Path of a tenant's own file, when it has one
    pub fn tenant_path(&self, username: &str) -> Option<std::path::PathBuf> {
        match self {
            Storage::Shared { .. } => None,
            Storage::Isolated { tenants, .. } => Some(tenants.db_path(username)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shared_layout() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open_unencrypted(StorageMode::Shared, dir.path()).unwrap();
        assert_eq!(storage.mode(), StorageMode::Shared);
        assert!(dir.path().join("nota.db").exists());

        storage.provision(1, "alice").unwrap();
        let (_, partition) = storage.receipts_for(1, "alice").unwrap();
        assert_eq!(partition, Partition::Owner(1));
        assert!(storage.tenant_path("alice").is_none());
    }

    #[test]
    fn test_isolated_layout() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open_unencrypted(StorageMode::Isolated, dir.path()).unwrap();
        assert_eq!(storage.accounts().schema(), Schema::Accounts);

        storage.provision(1, "alice").unwrap();
        let path = storage.tenant_path("alice").unwrap();
        assert!(path.exists());

        let (db, partition) = storage.receipts_for(1, "alice").unwrap();
        assert_eq!(partition, Partition::Whole);
        assert_eq!(db.schema(), Schema::Tenant);

        drop(db);
        storage.remove_tenant(1, "alice").unwrap();
        assert!(!path.exists());
    }
}
