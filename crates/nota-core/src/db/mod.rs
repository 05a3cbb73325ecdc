//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Account rows (registration, login lookup, deletion)
//! - `receipts` - Receipt headers and their line items
//! - `reports` - Spending aggregation and advisory item queries
//! - `registry` - Per-tenant database handles for isolated storage
//!
//! A `Database` is one SQLite file. Which tables it carries depends on its
//! `Schema`: the shared file holds accounts and every tenant's receipts, while
//! in isolated mode an accounts-only file sits next to one receipts-only file
//! per tenant.

use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::debug;

use crate::error::{Error, Result};

mod receipts;
mod registry;
mod reports;
mod users;


pub use registry::{TenantRegistry, TENANTS_DIR};
pub use reports::parse_amount;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable the CLI reads the database passphrase from
pub const DB_KEY_ENV: &str = "NOTA_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. Per-tenant files opened later share the key.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"nota-salt-v1-fix";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Which tables a database file carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Accounts plus receipts of every tenant, rows tagged with `user_id`
    Shared,
    /// Accounts only (isolated mode's global file)
    Accounts,
    /// One tenant's receipts, no owner column
    Tenant,
}

/// Row scope inside a database file
///
/// In a shared file every receipt query must be narrowed to its owner; a
/// tenant file already is the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Owner(i64),
    Whole,
}

impl Partition {
    pub fn owner(&self) -> Option<i64> {
        match self {
            Self::Owner(id) => Some(*id),
            Self::Whole => None,
        }
    }

    /// SQL condition (prefixed with AND) restricting `alias` to this partition
    pub(crate) fn condition(&self, alias: &str) -> String {
        match self {
            Self::Owner(_) => format!("AND {}.user_id = ?", alias),
            Self::Whole => String::new(),
        }
    }

    /// Push the parameter matching `condition`, if any
    pub(crate) fn push_param(&self, params: &mut Vec<Box<dyn rusqlite::ToSql>>) {
        if let Self::Owner(id) = self {
            params.push(Box::new(*id));
        }
    }
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    schema: Schema,
}

impl Database {
    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing.
    pub fn new_unencrypted(path: &str, schema: Schema) -> Result<Self> {
        Self::new_with_key(path, schema, None)
    }

    /// Create a new database with an explicit encryption passphrase
    pub fn new_with_key(path: &str, schema: Schema, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = match passphrase {
            Some(pass) => Some(format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?)),
            None => None,
        };

        // Key first, then per-connection pragmas; foreign_keys is not persistent
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(ref pragma) = key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            schema,
        };
        db.run_migrations()?;
        debug!(path = %path, schema = ?schema, "Database opened");

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory(schema: Schema) -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "nota_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path, schema)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block the single writer
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        match self.schema {
            Schema::Shared => {
                conn.execute_batch(USERS_SQL)?;
                conn.execute_batch(SHARED_RECEIPTS_SQL)?;
            }
            Schema::Accounts => conn.execute_batch(USERS_SQL)?,
            Schema::Tenant => conn.execute_batch(TENANT_RECEIPTS_SQL)?,
        }

        Ok(())
    }
}

const USERS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,          -- Argon2id PHC string
        date_created TEXT NOT NULL
    );
"#;

const SHARED_RECEIPTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS notas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cnpj TEXT NOT NULL,
        emissao TEXT NOT NULL,
        dados_nota TEXT NOT NULL,        -- JSON of the extracted header
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        user_note_id INTEGER NOT NULL    -- tenant-local sequential id
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_notas_user_note ON notas(user_id, user_note_id);

    CREATE TABLE IF NOT EXISTS produtos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nota_id INTEGER NOT NULL REFERENCES notas(id) ON DELETE CASCADE,
        produto_id TEXT,
        nome TEXT,
        categoria TEXT,
        quantidade TEXT,
        unidade TEXT,
        valor_unitario TEXT,
        valor_total TEXT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_produtos_nota ON produtos(nota_id);
    CREATE INDEX IF NOT EXISTS idx_produtos_user ON produtos(user_id);
"#;

const TENANT_RECEIPTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS notas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cnpj TEXT NOT NULL,
        emissao TEXT NOT NULL,
        dados_nota TEXT NOT NULL,
        user_note_id INTEGER NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS produtos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nota_id INTEGER NOT NULL REFERENCES notas(id) ON DELETE CASCADE,
        produto_id TEXT,
        nome TEXT,
        categoria TEXT,
        quantidade TEXT,
        unidade TEXT,
        valor_unitario TEXT,
        valor_total TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_produtos_nota ON produtos(nota_id);
"#;
