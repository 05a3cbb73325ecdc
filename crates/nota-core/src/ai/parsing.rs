//! Parsing helpers for model responses
//!
//! The extraction contract is strict: the answer must be a bare JSON object.
//! Anything else is rejected with a preview of what came back, before any
//! persistence happens.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{ExtractedReceipt, LineItem, NOT_INFORMED};

use super::types::{RawExtraction, RawItem, HEADER_ISSUED_AT_KEY, HEADER_MERCHANT_KEY};

/// Characters of bad output kept in error messages
pub const PREVIEW_CHARS: usize = 200;

/// Truncate model output for diagnostics
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Parse an extraction answer into a receipt ready to persist
pub fn parse_extraction(response: &str) -> Result<ExtractedReceipt> {
    let response = response.trim();
    if response.is_empty() {
        return Err(Error::EmptyResponse);
    }

    // A fenced or prose-wrapped answer fails here
    if !(response.starts_with('{') || response.starts_with('[')) {
        return Err(Error::MalformedResponse(format!(
            "Model output does not look like JSON: {}",
            preview(response)
        )));
    }

    let value: Value = serde_json::from_str(response).map_err(|e| {
        Error::MalformedResponse(format!(
            "Invalid JSON from model: {} | Raw: {}",
            e,
            preview(response)
        ))
    })?;

    if !value.is_object() {
        return Err(Error::MalformedResponse(format!(
            "Expected a JSON object with \"Dados Nota\" and \"Produtos\" | Raw: {}",
            preview(response)
        )));
    }

    let raw: RawExtraction = serde_json::from_value(value).map_err(|e| {
        Error::MalformedResponse(format!(
            "Unexpected extraction shape: {} | Raw: {}",
            e,
            preview(response)
        ))
    })?;

    Ok(normalize(raw))
}

/// Check an advisory answer
pub fn parse_advisory(response: &str) -> Result<String> {
    let text = response.trim();
    if text.is_empty() {
        return Err(Error::EmptyResponse);
    }
    Ok(text.to_string())
}

fn normalize(raw: RawExtraction) -> ExtractedReceipt {
    let header = raw.header.unwrap_or_default();
    let merchant_id = header_text(&header, HEADER_MERCHANT_KEY);
    let issued_at = header_text(&header, HEADER_ISSUED_AT_KEY);

    let items = raw
        .items
        .unwrap_or_default()
        .into_iter()
        .map(normalize_item)
        .collect();

    ExtractedReceipt {
        merchant_id,
        issued_at,
        document: Value::Object(header),
        items,
    }
}

fn normalize_item(item: RawItem) -> LineItem {
    let traits = item.traits.unwrap_or_default();
    LineItem {
        external_id: text_or_sentinel(item.id.as_ref()),
        name: text_or_sentinel(item.text.as_ref()),
        category: text_or_sentinel(item.category.as_ref()),
        quantity: text_or_sentinel(traits.quantity.as_ref()),
        unit: text_or_sentinel(traits.unit.as_ref()),
        unit_price: text_or_sentinel(traits.unit_price.as_ref()),
        total_price: text_or_sentinel(traits.total_price.as_ref()),
    }
}

fn header_text(header: &Map<String, Value>, key: &str) -> String {
    text_or_sentinel(header.get(key))
}

/// Scalars become their text, absent or null becomes the placeholder
fn text_or_sentinel(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_INFORMED.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
