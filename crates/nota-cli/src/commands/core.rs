//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `App` - resolved config, the opened service and the session file
//! - `open_app` - Shared utility to open storage and clients
//! - `cmd_init` - Initialize the data directory
//! - `cmd_status` - Show configuration and backend health

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nota_core::config::Config;
use nota_core::db::{DB_KEY_ENV, TENANTS_DIR};
use nota_core::session::SESSION_FILE_NAME;
use nota_core::{AIBackend, NotaService, Session, Storage};

/// Everything a command needs
pub struct App {
    pub config: Config,
    pub service: NotaService,
    pub session_path: PathBuf,
    pub encrypted: bool,
}

impl App {
    pub fn new(config: Config, service: NotaService, encrypted: bool) -> Self {
        let session_path = config.storage.data_dir.join(SESSION_FILE_NAME);
        Self {
            config,
            service,
            session_path,
            encrypted,
        }
    }

    /// Current session; a missing file means nobody is logged in
    pub fn session(&self) -> Result<Session> {
        Session::load(&self.session_path).context("Failed to read session file")
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        match session {
            Session::Anonymous => Session::clear(&self.session_path),
            Session::LoggedIn { .. } => session.save(&self.session_path),
        }
        .context("Failed to write session file")
    }
}

/// Database passphrase from NOTA_DB_KEY, or none with --no-encrypt
pub fn db_passphrase(no_encrypt: bool) -> Result<Option<String>> {
    if no_encrypt {
        return Ok(None);
    }
    match std::env::var(DB_KEY_ENV) {
        Ok(key) if !key.is_empty() => Ok(Some(key)),
        _ => anyhow::bail!(
            "Database encryption required. Set {} environment variable with your passphrase, \
            or use --no-encrypt for unencrypted databases (not recommended for production).",
            DB_KEY_ENV
        ),
    }
}

/// Resolve config, then open storage and clients
pub fn open_app(
    data_dir: Option<&Path>,
    config_path: Option<&Path>,
    no_encrypt: bool,
) -> Result<App> {
    let config = Config::load(data_dir, config_path).context("Failed to load configuration")?;
    let passphrase = db_passphrase(no_encrypt)?;
    let service = NotaService::from_config(&config, passphrase).context(format!(
        "Failed to open storage at {}",
        config.storage.data_dir.display()
    ))?;
    Ok(App::new(config, service, !no_encrypt))
}

pub fn cmd_init(app: &App) -> Result<()> {
    let storage = &app.config.storage;
    println!("🔧 Initialized data directory {}", storage.data_dir.display());
    println!("   Storage mode: {}", storage.mode.as_str());
    println!("   Database: {}", storage.database_path().display());
    if let Storage::Isolated { .. } = app.service.storage() {
        println!(
            "   Tenant files: {}",
            storage.data_dir.join(TENANTS_DIR).display()
        );
    }

    if app.encrypted {
        println!("   🔒 Encryption: ENABLED");
    } else {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    }

    println!("✅ Ready!");
    println!();
    println!("Next steps:");
    println!("  1. Create an account: nota register <username> --password ... --secret ...");
    println!("  2. Add a receipt: nota add <NFC-e URL>");

    Ok(())
}

pub async fn cmd_status(app: &App) -> Result<()> {
    let storage = &app.config.storage;
    let session = app.session()?;

    println!("📊 Nota Status");
    println!("   ─────────────────────────────");
    println!("   Data directory: {}", storage.data_dir.display());
    println!("   Storage mode:   {}", storage.mode.as_str());
    println!("   Database:       {}", storage.database_path().display());
    println!(
        "   Encryption:     {}",
        if app.encrypted { "enabled" } else { "disabled" }
    );
    println!(
        "   Accounts:       {}",
        app.service.storage().accounts().list_users()?.len()
    );
    match session.username() {
        Some(name) => {
            println!("   Logged in as:   {}", name);
            if let Ok(count) = app.service.count_receipts(&session) {
                println!("   Receipts:       {}", count);
            }
        }
        None => println!("   Logged in as:   (nobody)"),
    }

    let ai = app.service.ai();
    let healthy = ai.health_check().await;
    println!();
    println!("🤖 Model backend: {}", ai.backend_name());
    println!("   Host:  {}", ai.host());
    println!("   Model: {}", ai.model());
    println!(
        "   Health: {}",
        if healthy { "✓ reachable" } else { "✗ unreachable" }
    );

    Ok(())
}
