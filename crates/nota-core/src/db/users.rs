//! Account rows

use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Tenant;

/// Message shown when a username is taken
pub(crate) const USERNAME_TAKEN: &str = "Este nome de usuário já está em uso. Escolha outro.";

impl Database {
    /// Insert a new account row, returning its id
    ///
    /// `password_hash` must already be hashed. Fails with `Error::Conflict`
    /// when the username exists, including when a concurrent registration
    /// wins the race between the lookup and the insert.
    pub fn insert_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(Error::Conflict(USERNAME_TAKEN.to_string()));
        }

        let created = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        match conn.execute(
            "INSERT INTO users (username, password, date_created) VALUES (?, ?, ?)",
            params![username, password_hash, created],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(USERNAME_TAKEN.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up the stored id and password hash for a username
    pub fn get_user_credentials(&self, username: &str) -> Result<Option<(i64, String)>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, password FROM users WHERE username = ?",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// Get an account by id
    pub fn get_user(&self, id: i64) -> Result<Option<Tenant>> {
        let conn = self.conn()?;
        let tenant = conn
            .query_row(
                "SELECT id, username, date_created FROM users WHERE id = ?",
                params![id],
                |row| {
                    let created: String = row.get(2)?;
                    Ok(Tenant {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: parse_datetime(&created),
                    })
                },
            )
            .optional()?;
        Ok(tenant)
    }

    /// List all accounts ordered by creation
    pub fn list_users(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, username, date_created FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                let created: String = row.get(2)?;
                Ok(Tenant {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    created_at: parse_datetime(&created),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Delete an account and, in a shared file, every receipt it owns
    ///
    /// Returns false when no such account existed.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if self.schema == super::Schema::Shared {
            tx.execute("DELETE FROM produtos WHERE user_id = ?", params![id])?;
            tx.execute("DELETE FROM notas WHERE user_id = ?", params![id])?;
        }
        let removed = tx.execute("DELETE FROM users WHERE id = ?", params![id])?;

        tx.commit()?;
        Ok(removed > 0)
    }
}
