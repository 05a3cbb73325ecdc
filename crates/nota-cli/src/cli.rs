//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Nota - Track spending from electronic receipts (NFC-e)
#[derive(Parser)]
#[command(name = "nota")]
#[command(about = "Receipt spending tracker with model-assisted extraction", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (databases, session, config.toml)
    ///
    /// Defaults to NOTA_DATA_DIR, then storage.data_dir from the config,
    /// then the platform data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file overriding the built-in defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, databases are encrypted using SQLCipher.
    /// Set NOTA_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and database files
    Init,

    /// Show storage mode, paths, session and model backend health
    Status,

    /// Create an account (requires the enrollment passphrase) and log in
    Register {
        username: String,

        /// Account password
        #[arg(long, env = "NOTA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Enrollment passphrase shared out of band
        #[arg(long, env = "NOTA_ENROLLMENT_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Log in
    Login {
        username: String,

        /// Account password
        #[arg(long, env = "NOTA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log out
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Delete the logged-in account and all of its receipts
    DeleteAccount {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Add a receipt from its NFC-e consultation URL
    Add {
        /// Receipt page URL (usually from the QR code)
        url: String,
    },

    /// List your receipts
    List,

    /// Show a receipt and its items
    Show {
        /// Receipt ID as shown by `nota list`
        id: i64,
    },

    /// Spending report: totals per category, top items, grand total
    Report {
        /// Comma-separated receipt IDs (default: all receipts)
        #[arg(long)]
        ids: Option<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask the model for a price comparison across your purchases
    Advise,

    /// Manage model prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (extract_receipt, price_advisory)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
