//! Who is logged in
//!
//! A session is a plain value handed to every tenant operation. Front ends
//! decide where it lives between calls; the CLI keeps it in a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// File name used for the persisted session inside the data directory
pub const SESSION_FILE_NAME: &str = "session.json";

/// Message for operations that need a logged-in tenant
pub const NOT_LOGGED_IN: &str = "Você não está logado.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Anonymous,
    LoggedIn { tenant_id: i64, username: String },
}

impl Session {
    pub fn logged_in(tenant_id: i64, username: impl Into<String>) -> Self {
        Session::LoggedIn {
            tenant_id,
            username: username.into(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Session::LoggedIn { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Session::LoggedIn { username, .. } => Some(username),
            Session::Anonymous => None,
        }
    }

    /// Tenant id and username, or `Authorization` when anonymous
    pub fn require(&self) -> Result<(i64, &str)> {
        match self {
            Session::LoggedIn {
                tenant_id,
                username,
            } => Ok((*tenant_id, username.as_str())),
            Session::Anonymous => Err(Error::Authorization(NOT_LOGGED_IN.to_string())),
        }
    }

    /// Read a persisted session; a missing file is an anonymous session
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::Anonymous),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), logged_in = self.is_logged_in(), "Session saved");
        Ok(())
    }

    /// Remove a persisted session file, if any
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
