//! Nota Core Library
//!
//! Shared functionality for the Nota receipt spending tracker:
//! - Account store with Argon2 password hashing and an enrollment passphrase
//! - Shared or per-tenant SQLite storage (SQLCipher when keyed)
//! - Extraction pipeline: NFC-e page fetch plus a structured model call
//! - Spending aggregation and price advisory
//! - Prompt library for customizable model prompts
//! - Layered configuration

pub mod accounts;
pub mod advisory;
pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod prompts;
pub mod service;
pub mod session;
pub mod storage;

/// Test utilities including the mock receipt/model server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use accounts::AccountStore;
pub use advisory::AdvisoryGenerator;
pub use ai::{AIBackend, AIClient, MockBackend, OpenAICompatibleBackend};
pub use config::Config;
pub use db::{Database, Partition, Schema, TenantRegistry};
pub use error::{Error, Result};
pub use extract::ReceiptExtractor;
pub use fetch::PageFetcher;
pub use models::{
    AdvisoryItem, ExtractedReceipt, FinancialReport, LineItem, Receipt, ReceiptSummary,
    StorageMode, Tenant,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use service::{NotaService, Operation, Outcome};
pub use session::Session;
pub use storage::Storage;
