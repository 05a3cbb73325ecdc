//! Report command implementations

use anyhow::Result;
use nota_core::service::{parse_id_list, render_report};
use nota_core::{Operation, Outcome};

use super::{emit, App};

/// Spending report over all receipts or the `--ids` subset
///
/// An id list without a single usable number covers every receipt.
pub fn cmd_report(app: &App, ids: Option<&str>, json: bool) -> Result<Outcome> {
    let session = app.session()?;
    let subset = ids.and_then(parse_id_list);

    let result = app
        .service
        .compute_financials(&session, subset.as_ref())
        .and_then(|report| {
            let text = if json {
                serde_json::to_string_pretty(&report)?
            } else {
                render_report(&report)
            };
            if report.skipped_items > 0 {
                tracing::warn!(
                    skipped = report.skipped_items,
                    "Items with non-numeric totals were left out"
                );
            }
            Ok(text)
        });
    Ok(emit(Operation::ComputeFinancials.outcome(result)))
}

pub async fn cmd_advise(app: &App) -> Result<Outcome> {
    let session = app.session()?;
    println!("🤖 Asking the model for a price comparison...");
    let result = app.service.generate_advisory(&session).await;
    Ok(emit(Operation::GenerateAdvisory.outcome(result)))
}
