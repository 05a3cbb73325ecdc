//! Application configuration
//!
//! ## Resolution
//!
//! 1. Embedded defaults (compiled into binary from `config/nota.toml`)
//! 2. Override file: `--config PATH`, else `<data_dir>/config.toml`
//! 3. Environment variables for individual keys
//!
//! The override file only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::StorageMode;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/nota.toml");

/// Name of the override file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const ENV_DATA_DIR: &str = "NOTA_DATA_DIR";
pub const ENV_STORAGE_MODE: &str = "NOTA_STORAGE_MODE";
pub const ENV_ENROLLMENT_SECRET: &str = "NOTA_ENROLLMENT_SECRET";
pub const ENV_AI_HOST: &str = "OPENAI_COMPATIBLE_HOST";
pub const ENV_AI_MODEL: &str = "OPENAI_COMPATIBLE_MODEL";
pub const ENV_AI_API_KEY: &str = "OPENAI_COMPATIBLE_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Default data directory (~/.local/share/nota on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nota")
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub data_dir: PathBuf,
    /// Shared database file name, or the accounts file in isolated mode
    pub database: String,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }
}

#[derive(Clone)]
pub struct EnrollmentConfig {
    pub passphrase: String,
}

impl std::fmt::Debug for EnrollmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentConfig")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct AiConfig {
    pub host: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub enrollment: EnrollmentConfig,
    pub ai: AiConfig,
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                mode: StorageMode::Shared,
                data_dir: default_data_dir(),
                database: "nota.db".to_string(),
            },
            enrollment: EnrollmentConfig {
                passphrase: String::new(),
            },
            ai: AiConfig {
                host: "https://api.openai.com".to_string(),
                model: "gpt-4".to_string(),
                api_key: None,
                timeout: Duration::from_secs(120),
            },
            fetch: FetchConfig {
                timeout: Duration::from_secs(30),
                user_agent: format!("nota/{}", env!("CARGO_PKG_VERSION")),
            },
        }
    }
}

impl Config {
    /// Load configuration from all layers
    ///
    /// `data_dir` (e.g. from `--data-dir`) wins over `NOTA_DATA_DIR`, which
    /// wins over `storage.data_dir` from a file. It is also where the default
    /// override file is looked up.
    pub fn load(data_dir: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self::load_with(data_dir, config_path, env)
    }

    /// Load with an explicit environment lookup (used by tests)
    pub fn load_with<F>(data_dir: Option<&Path>, config_path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_toml(DEFAULT_CONFIG)?;

        // The data dir decides where the override file lives, so settle it first
        let explicit_dir = data_dir
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_DATA_DIR).map(PathBuf::from));
        let lookup_dir = explicit_dir
            .clone()
            .unwrap_or_else(|| config.storage.data_dir.clone());

        let override_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| lookup_dir.join(CONFIG_FILE_NAME));
        if override_path.exists() {
            let content = fs::read_to_string(&override_path).map_err(|e| {
                Error::InvalidData(format!(
                    "Failed to read config {}: {}",
                    override_path.display(),
                    e
                ))
            })?;
            config.apply_toml(&content)?;
            debug!(path = %override_path.display(), "Config override loaded");
        } else if config_path.is_some() {
            return Err(Error::NotFound(format!(
                "config file {}",
                override_path.display()
            )));
        }

        config.apply_env(&env)?;
        if let Some(dir) = explicit_dir {
            config.storage.data_dir = dir;
        }

        Ok(config)
    }

    /// Parse a TOML document and apply the keys it sets
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)?;

        if let Some(storage) = raw.storage {
            if let Some(mode) = storage.mode {
                self.storage.mode = mode.parse().map_err(Error::InvalidData)?;
            }
            if let Some(dir) = storage.data_dir {
                self.storage.data_dir = PathBuf::from(dir);
            }
            if let Some(database) = storage.database {
                self.storage.database = database;
            }
        }

        if let Some(enrollment) = raw.enrollment {
            if let Some(passphrase) = enrollment.passphrase {
                self.enrollment.passphrase = passphrase;
            }
        }

        if let Some(ai) = raw.ai {
            if let Some(host) = ai.host {
                self.ai.host = host;
            }
            if let Some(model) = ai.model {
                self.ai.model = model;
            }
            if let Some(key) = ai.api_key {
                self.ai.api_key = Some(key);
            }
            if let Some(secs) = ai.timeout_secs {
                self.ai.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(fetch) = raw.fetch {
            if let Some(secs) = fetch.timeout_secs {
                self.fetch.timeout = Duration::from_secs(secs);
            }
            if let Some(agent) = fetch.user_agent {
                self.fetch.user_agent = agent;
            }
        }

        Ok(())
    }

    fn apply_env<F>(&mut self, env: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = env(ENV_STORAGE_MODE) {
            self.storage.mode = mode.parse().map_err(Error::InvalidData)?;
        }
        if let Some(secret) = env(ENV_ENROLLMENT_SECRET) {
            self.enrollment.passphrase = secret;
        }
        if let Some(host) = env(ENV_AI_HOST) {
            self.ai.host = host;
        }
        if let Some(model) = env(ENV_AI_MODEL) {
            self.ai.model = model;
        }
        if let Some(key) = env(ENV_AI_API_KEY).or_else(|| env(ENV_OPENAI_API_KEY)) {
            self.ai.api_key = Some(key);
        }
        Ok(())
    }

    /// Path of the main database file (shared, or accounts in isolated mode)
    pub fn database_path(&self) -> PathBuf {
        self.storage.database_path()
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    storage: Option<RawStorage>,
    enrollment: Option<RawEnrollment>,
    ai: Option<RawAi>,
    fetch: Option<RawFetch>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    mode: Option<String>,
    data_dir: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnrollment {
    passphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAi {
    host: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawFetch {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_embedded_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_with(Some(dir.path()), None, no_env).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Shared);
        assert_eq!(config.storage.database, "nota.db");
        assert_eq!(config.storage.data_dir, dir.path());
        assert_eq!(config.enrollment.passphrase, "paralelo2025");
        assert_eq!(config.ai.model, "gpt-4");
        assert_eq!(config.ai.timeout, Duration::from_secs(120));
        assert_eq!(config.fetch.timeout, Duration::from_secs(30));
        assert!(config.ai.api_key.is_none());
    }

    #[test]
    fn test_override_file_partial() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[storage]\nmode = \"isolated\"\n\n[fetch]\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = Config::load_with(Some(dir.path()), None, no_env).unwrap();
        assert_eq!(config.storage.mode, StorageMode::Isolated);
        assert_eq!(config.fetch.timeout, Duration::from_secs(5));
        // Untouched keys keep their defaults
        assert_eq!(config.ai.model, "gpt-4");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[ai]\nmodel = \"from-file\"\n",
        )
        .unwrap();

        let vars: HashMap<&str, &str> = [
            (ENV_AI_MODEL, "from-env"),
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_ENROLLMENT_SECRET, "s3cret"),
            (ENV_STORAGE_MODE, "per-user"),
        ]
        .into_iter()
        .collect();
        let env = |k: &str| vars.get(k).map(|v| v.to_string());

        let config = Config::load_with(Some(dir.path()), None, env).unwrap();
        assert_eq!(config.ai.model, "from-env");
        assert_eq!(config.ai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.enrollment.passphrase, "s3cret");
        assert_eq!(config.storage.mode, StorageMode::Isolated);
    }

    #[test]
    fn test_explicit_config_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = Config::load_with(Some(dir.path()), Some(&missing), no_env);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let mut config = Config::default();
        let result = config.apply_toml("[storage]\nmode = \"cloud\"\n");
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = Config::default();
        config.ai.api_key = Some("sk-very-secret".into());
        config.enrollment.passphrase = "hunter2".into();
        let shown = format!("{:?}", config);
        assert!(!shown.contains("sk-very-secret"));
        assert!(!shown.contains("hunter2"));
    }
}
