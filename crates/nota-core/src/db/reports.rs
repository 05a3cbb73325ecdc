//! Spending aggregation and advisory queries
//!
//! Prices are stored as the text the model produced. They are read back as
//! numbers here, and a price that cannot be read is left out of every sum
//! rather than counted as zero.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{Database, Partition};
use crate::error::Result;
use crate::models::{AdvisoryItem, CategoryTotal, FinancialReport, TopItem, NOT_INFORMED};

/// How many items the most-expensive list keeps
pub const TOP_ITEMS_LIMIT: usize = 10;

/// A line item reduced to what the aggregation needs
#[derive(Debug, Clone)]
pub(crate) struct PricedRow {
    pub name: String,
    pub category: String,
    pub total_price: String,
}

fn amount_patterns() -> &'static [(Regex, AmountStyle); 4] {
    static PATTERNS: OnceLock<[(Regex, AmountStyle); 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // 10 / 10.5 / 1.234 (dot decimal, no grouping)
            (
                Regex::new(r"^-?\d+(\.\d+)?$").expect("valid regex"),
                AmountStyle::Plain,
            ),
            // 10,50 (comma decimal)
            (
                Regex::new(r"^-?\d+,\d+$").expect("valid regex"),
                AmountStyle::CommaDecimal,
            ),
            // 1.234,56 / 1.234.567 (dot grouping, comma decimal)
            (
                Regex::new(r"^-?\d{1,3}(\.\d{3})+(,\d+)?$").expect("valid regex"),
                AmountStyle::DotGrouped,
            ),
            // 1,234.56 / 1,234,567 (comma grouping, dot decimal)
            (
                Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"),
                AmountStyle::CommaGrouped,
            ),
        ]
    })
}

#[derive(Debug, Clone, Copy)]
enum AmountStyle {
    Plain,
    CommaDecimal,
    DotGrouped,
    CommaGrouped,
}

/// Read a price written as text
///
/// Accepts an optional `R$` prefix and the usual Brazilian and US notations.
/// Patterns are tried in order, so an ambiguous `1.234` reads as one point
/// two three four. Returns None for anything else, including the
/// not-informed placeholder.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (_, style) = amount_patterns()
        .iter()
        .find(|(re, _)| re.is_match(&cleaned))?;

    let normalized = match style {
        AmountStyle::Plain => cleaned,
        AmountStyle::CommaDecimal => cleaned.replace(',', "."),
        AmountStyle::DotGrouped => cleaned.replace('.', "").replace(',', "."),
        AmountStyle::CommaGrouped => cleaned.replace(',', ""),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fold priced rows into a report
///
/// Rows must arrive in insertion order: the top list uses a stable sort, so
/// equal totals keep that order.
pub(crate) fn aggregate(rows: &[PricedRow]) -> FinancialReport {
    let mut report = FinancialReport::default();
    let mut category_index: HashMap<&str, usize> = HashMap::new();
    let mut priced: Vec<TopItem> = Vec::new();

    for row in rows {
        let Some(total) = parse_amount(&row.total_price) else {
            debug!(item = %row.name, price = %row.total_price, "Skipping non-numeric total");
            report.skipped_items += 1;
            continue;
        };

        match category_index.get(row.category.as_str()) {
            Some(&idx) => report.category_totals[idx].total += total,
            None => {
                category_index.insert(row.category.as_str(), report.category_totals.len());
                report.category_totals.push(CategoryTotal {
                    category: row.category.clone(),
                    total,
                });
            }
        }

        report.grand_total += total;
        priced.push(TopItem {
            name: row.name.clone(),
            total,
        });
    }

    priced.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    priced.truncate(TOP_ITEMS_LIMIT);
    report.top_items = priced;

    report
}

impl Database {
    /// Compute category totals, the ten most expensive items and the grand total
    ///
    /// `receipt_ids` holds tenant-local ids. `None` covers every receipt in
    /// the partition; an empty set covers nothing. Unknown ids are ignored.
    pub fn compute_financials(
        &self,
        partition: Partition,
        receipt_ids: Option<&BTreeSet<i64>>,
    ) -> Result<FinancialReport> {
        if matches!(receipt_ids, Some(ids) if ids.is_empty()) {
            return Ok(FinancialReport::default());
        }

        let rows = self.priced_rows(partition, receipt_ids)?;
        let report = aggregate(&rows);
        debug!(
            rows = rows.len(),
            skipped = report.skipped_items,
            total = report.grand_total,
            "Financial report computed"
        );
        Ok(report)
    }

    /// Line items in scope, in insertion order
    pub(crate) fn priced_rows(
        &self,
        partition: Partition,
        receipt_ids: Option<&BTreeSet<i64>>,
    ) -> Result<Vec<PricedRow>> {
        let conn = self.conn()?;

        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        partition.push_param(&mut query_params);

        let id_clause = match receipt_ids {
            Some(ids) => {
                let placeholders = vec!["?"; ids.len()].join(",");
                for id in ids {
                    query_params.push(Box::new(*id));
                }
                format!("AND n.user_note_id IN ({})", placeholders)
            }
            None => String::new(),
        };

        let sql = format!(
            "SELECT p.nome, p.categoria, p.valor_total
             FROM produtos p
             JOIN notas n ON p.nota_id = n.id
             WHERE 1 = 1 {} {}
             ORDER BY p.id",
            partition.condition("n"),
            id_clause
        );

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok(PricedRow {
                    name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    category: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    total_price: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Items usable for price comparison: a name and a unit price are both present
    ///
    /// Ordered by product name so the same product from different merchants
    /// ends up on adjacent lines.
    pub fn advisory_items(&self, partition: Partition) -> Result<Vec<AdvisoryItem>> {
        let conn = self.conn()?;

        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        partition.push_param(&mut query_params);
        query_params.push(Box::new(NOT_INFORMED));

        let sql = format!(
            "SELECT p.nome, n.cnpj, p.valor_unitario
             FROM produtos p
             JOIN notas n ON p.nota_id = n.id
             WHERE p.nome IS NOT NULL AND p.nome != ''
               AND p.valor_unitario IS NOT NULL AND p.valor_unitario != ''
               {}
               AND p.valor_unitario != ?
             ORDER BY p.nome, p.id",
            partition.condition("n")
        );

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok(AdvisoryItem {
                    name: row.get(0)?,
                    merchant_id: row.get(1)?,
                    unit_price: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, category: &str, total: &str) -> PricedRow {
        PricedRow {
            name: name.into(),
            category: category.into(),
            total_price: total.into(),
        }
    }

    #[test]
    fn test_parse_amount_notations() {
        assert_eq!(parse_amount("10.50"), Some(10.5));
        assert_eq!(parse_amount("10,50"), Some(10.5));
        assert_eq!(parse_amount("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
        assert_eq!(parse_amount(" 7 "), Some(7.0));
        assert_eq!(parse_amount("-2,00"), Some(-2.0));
    }

    #[test]
    fn test_parse_amount_rejects_text() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(NOT_INFORMED), None);
        assert_eq!(parse_amount("10.50.3,2"), None);
        assert_eq!(parse_amount("R$"), None);
    }

    #[test]
    fn test_aggregate_empty() {
        let report = aggregate(&[]);
        assert_eq!(report.grand_total, 0.0);
        assert!(report.category_totals.is_empty());
        assert!(report.top_items.is_empty());
    }

    #[test]
    fn test_aggregate_excludes_non_numeric() {
        let rows = vec![
            row("Arroz", "Food", "10.00"),
            row("Feijão", "Food", "n/a"),
            row("Sabão", "Cleaning", "3,50"),
        ];
        let report = aggregate(&rows);
        assert_eq!(report.skipped_items, 1);
        assert!((report.grand_total - 13.5).abs() < 1e-9);
        assert_eq!(report.category_total("Food"), Some(10.0));
        assert_eq!(report.category_total("Cleaning"), Some(3.5));
        assert_eq!(report.top_items.len(), 2);
    }

    #[test]
    fn test_aggregate_categories_are_case_sensitive() {
        let rows = vec![row("a", "Food", "1"), row("b", "food", "2")];
        let report = aggregate(&rows);
        assert_eq!(report.category_totals.len(), 2);
        assert_eq!(report.category_totals[0].category, "Food");
        assert_eq!(report.category_totals[1].category, "food");
    }

    #[test]
    fn test_aggregate_top_items_limit_and_order() {
        let rows: Vec<PricedRow> = (1..=12)
            .map(|i| row(&format!("item{}", i), "Misc", &format!("{}.00", i)))
            .collect();
        let report = aggregate(&rows);
        assert_eq!(report.top_items.len(), TOP_ITEMS_LIMIT);
        assert_eq!(report.top_items[0].name, "item12");
        assert_eq!(report.top_items[9].name, "item3");
        assert!((report.grand_total - 78.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_ties_keep_input_order() {
        let rows = vec![
            row("first", "X", "5"),
            row("second", "X", "5"),
            row("third", "X", "9"),
        ];
        let report = aggregate(&rows);
        let names: Vec<&str> = report.top_items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["third", "first", "second"]);
    }
}
