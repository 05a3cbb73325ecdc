//! Domain models for Nota

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored for any field the model did not provide
pub const NOT_INFORMED: &str = "Não informado";

/// How tenant data is laid out on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// One database file, every receipt row tagged with its owner
    #[default]
    Shared,
    /// A global accounts file plus one database file per tenant
    Isolated,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Isolated => "isolated",
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "isolated" | "per-user" | "per_user" => Ok(Self::Isolated),
            _ => Err(format!("Unknown storage mode: {}", s)),
        }
    }
}

/// A registered user and owner of a receipt partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Row shown by the receipt listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    /// Tenant-local sequential number (1, 2, 3...)
    pub local_id: i64,
    /// Merchant tax identifier (CNPJ)
    pub merchant_id: String,
    /// Issuance date as extracted, free-form
    pub issued_at: String,
}

/// A stored receipt header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Storage-assigned row id; never shown to users
    pub id: i64,
    pub local_id: i64,
    pub merchant_id: String,
    pub issued_at: String,
    /// Raw "Dados Nota" fields as returned by the model
    pub document: serde_json::Value,
}

/// A purchased product line
///
/// Every field is kept as the text the model produced. Prices are only
/// interpreted as numbers at aggregation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line identifier printed on the receipt
    pub external_id: String,
    pub name: String,
    /// Free-form category assigned by the model
    pub category: String,
    pub quantity: String,
    pub unit: String,
    pub unit_price: String,
    pub total_price: String,
}

/// Normalized output of the extraction pipeline, ready to persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub merchant_id: String,
    pub issued_at: String,
    pub document: serde_json::Value,
    pub items: Vec<LineItem>,
}

/// Total spent in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

/// One entry of the most-expensive-items list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopItem {
    pub name: String,
    pub total: f64,
}

/// Aggregate spending over a tenant's receipts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    /// Per-category sums, in first-seen category order
    pub category_totals: Vec<CategoryTotal>,
    /// Up to ten items with the largest total price, descending
    pub top_items: Vec<TopItem>,
    pub grand_total: f64,
    /// Items whose total price could not be read as a number
    pub skipped_items: usize,
}

impl FinancialReport {
    pub fn is_empty(&self) -> bool {
        self.category_totals.is_empty() && self.top_items.is_empty()
    }

    pub fn category_total(&self, category: &str) -> Option<f64> {
        self.category_totals
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.total)
    }
}

/// A line item as fed into the price advisory prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryItem {
    pub name: String,
    pub merchant_id: String,
    pub unit_price: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_mode_parse() {
        assert_eq!("shared".parse::<StorageMode>(), Ok(StorageMode::Shared));
        assert_eq!("Isolated".parse::<StorageMode>(), Ok(StorageMode::Isolated));
        assert_eq!("per-user".parse::<StorageMode>(), Ok(StorageMode::Isolated));
        assert!("cloud".parse::<StorageMode>().is_err());
    }

    #[test]
    fn test_storage_mode_serde() {
        let json = serde_json::to_string(&StorageMode::Isolated).unwrap();
        assert_eq!(json, "\"isolated\"");
    }

    #[test]
    fn test_report_lookup() {
        let report = FinancialReport {
            category_totals: vec![CategoryTotal {
                category: "Food".into(),
                total: 15.0,
            }],
            ..Default::default()
        };
        assert_eq!(report.category_total("Food"), Some(15.0));
        assert_eq!(report.category_total("food"), None);
        assert!(!report.is_empty());
        assert!(FinancialReport::default().is_empty());
    }
}
