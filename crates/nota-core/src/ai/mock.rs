//! Mock backend for testing
//!
//! Returns canned raw answers that go through the same parsing as real model
//! output, so tests exercise the validation path too.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::ExtractedReceipt;

use super::parsing::{parse_advisory, parse_extraction};
use super::AIBackend;

/// Extraction answer used when none is configured
pub const DEFAULT_EXTRACTION: &str = r#"{
    "Dados Nota": {
        "CNPJ": "11.111.111/0001-11",
        "Número": "1",
        "Série": "1",
        "Emissão": "2024-01-01",
        "Horário": "12:00:00"
    },
    "Produtos": [
        {
            "Id": "1",
            "Text": "item1",
            "Category": "Food",
            "Traits": {"Quantidade": "1", "Unidade": "UN", "Valor Unitário": "5.00", "Valor Total": "5.00"}
        },
        {
            "Id": "2",
            "Text": "item2",
            "Category": "Food",
            "Traits": {"Quantidade": "1", "Unidade": "UN", "Valor Unitário": "10.00", "Valor Total": "10.00"}
        }
    ]
}"#;

/// Advisory answer used when none is configured
pub const DEFAULT_ADVISORY: &str = "1. Comparação de valores: sem variações relevantes.";

/// Mock AI backend for testing
///
/// Records the last input of each call so tests can check what reached the
/// model.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    extraction: String,
    advisory: String,
    /// When set, every model call times out after this many seconds
    timeout_secs: Option<u64>,
    last_html: Arc<Mutex<Option<String>>>,
    last_summary: Arc<Mutex<Option<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            extraction: DEFAULT_EXTRACTION.to_string(),
            advisory: DEFAULT_ADVISORY.to_string(),
            timeout_secs: None,
            last_html: Arc::new(Mutex::new(None)),
            last_summary: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Answer extraction calls with this raw text
    pub fn with_extraction(mut self, raw: &str) -> Self {
        self.extraction = raw.to_string();
        self
    }

    /// Answer advisory calls with this raw text
    pub fn with_advisory(mut self, raw: &str) -> Self {
        self.advisory = raw.to_string();
        self
    }

    /// Make every model call fail with a timeout
    pub fn timing_out(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    /// HTML passed to the last extraction call
    pub fn last_html(&self) -> Option<String> {
        self.last_html.lock().ok().and_then(|g| g.clone())
    }

    /// Summary passed to the last advisory call
    pub fn last_summary(&self) -> Option<String> {
        self.last_summary.lock().ok().and_then(|g| g.clone())
    }

    fn check_failure(&self, operation: &str) -> Result<()> {
        match self.timeout_secs {
            Some(seconds) => Err(Error::Timeout {
                operation: operation.to_string(),
                seconds,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_receipt(&self, html: &str) -> Result<ExtractedReceipt> {
        if let Ok(mut last) = self.last_html.lock() {
            *last = Some(html.to_string());
        }
        self.check_failure("receipt extraction")?;
        parse_extraction(&self.extraction)
    }

    async fn price_advisory(&self, summary: &str) -> Result<String> {
        if let Ok(mut last) = self.last_summary.lock() {
            *last = Some(summary.to_string());
        }
        self.check_failure("price advisory")?;
        parse_advisory(&self.advisory)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
