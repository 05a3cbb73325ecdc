//! Wire shapes of the extraction answer
//!
//! The model is asked for `{"Dados Nota": {...}, "Produtos": [...]}`. Every
//! leaf is taken as loose JSON because models mix strings and numbers freely;
//! `parsing` turns the leaves into text.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Top-level extraction object
#[derive(Debug, Deserialize)]
pub struct RawExtraction {
    /// Receipt header fields (CNPJ, Número, Série, Emissão, Horário)
    #[serde(rename = "Dados Nota", default)]
    pub header: Option<Map<String, Value>>,
    #[serde(rename = "Produtos", default)]
    pub items: Option<Vec<RawItem>>,
}

/// One entry of `Produtos`
#[derive(Debug, Default, Deserialize)]
pub struct RawItem {
    #[serde(rename = "Id", default)]
    pub id: Option<Value>,
    #[serde(rename = "Text", default)]
    pub text: Option<Value>,
    #[serde(rename = "Category", default)]
    pub category: Option<Value>,
    #[serde(rename = "Traits", default)]
    pub traits: Option<RawTraits>,
}

/// Quantities and prices of an item
#[derive(Debug, Default, Deserialize)]
pub struct RawTraits {
    #[serde(rename = "Quantidade", default)]
    pub quantity: Option<Value>,
    #[serde(rename = "Unidade", default)]
    pub unit: Option<Value>,
    #[serde(rename = "Valor Unitário", default)]
    pub unit_price: Option<Value>,
    #[serde(rename = "Valor Total", default)]
    pub total_price: Option<Value>,
}

/// Header keys read into dedicated columns
pub const HEADER_MERCHANT_KEY: &str = "CNPJ";
pub const HEADER_ISSUED_AT_KEY: &str = "Emissão";
