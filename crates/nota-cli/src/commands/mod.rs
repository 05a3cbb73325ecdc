//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - init, status, and shared utilities (open_app, sessions)
//! - `account` - register, login, logout, whoami, delete-account
//! - `receipts` - add, list, show
//! - `reports` - spending report and price advisory
//! - `prompts` - Prompt library management commands

pub mod account;
pub mod core;
pub mod prompts;
pub mod receipts;
pub mod reports;

// Re-export command functions for main.rs
pub use account::*;
pub use core::*;
pub use prompts::*;
pub use receipts::*;
pub use reports::*;

use nota_core::Outcome;

/// Print an outcome (failures on stderr) and hand it back
pub fn emit(outcome: Outcome) -> Outcome {
    match &outcome {
        Outcome::Success(message) => println!("{}", message),
        Outcome::Failure { message, .. } => eprintln!("❌ {}", message),
    }
    outcome
}
