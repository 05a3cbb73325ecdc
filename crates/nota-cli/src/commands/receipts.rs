//! Receipt command implementations

use anyhow::Result;
use nota_core::service::{render_receipt, render_receipt_list, RECEIPT_ADDED};
use nota_core::{Operation, Outcome};

use super::{emit, App};

/// Fetch a receipt page, extract it and store it
pub async fn cmd_add(app: &App, url: &str) -> Result<Outcome> {
    let session = app.session()?;
    println!("🧾 Fetching receipt...");

    let result = app
        .service
        .add_receipt(&session, url)
        .await
        .map(|id| format!("{} (ID: {})", RECEIPT_ADDED, id));
    Ok(emit(Operation::AddReceipt.outcome(result)))
}

pub fn cmd_list(app: &App) -> Result<Outcome> {
    let session = app.session()?;
    let result = app
        .service
        .list_receipts(&session)
        .map(|receipts| render_receipt_list(&receipts));
    Ok(emit(Operation::ListReceipts.outcome(result)))
}

pub fn cmd_show(app: &App, id: i64) -> Result<Outcome> {
    let session = app.session()?;
    let result = app
        .service
        .get_receipt(&session, id)
        .map(|(receipt, items)| render_receipt(&receipt, &items));
    Ok(emit(Operation::GetReceipt.outcome(result)))
}
