//! Receipt operations

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{Database, Partition};
use crate::error::Result;
use crate::models::{ExtractedReceipt, LineItem, Receipt, ReceiptSummary};

impl Database {
    /// Persist a receipt and all of its line items, returning the new tenant-local id
    ///
    /// The next id is `MAX(user_note_id) + 1` within the partition. Reading the
    /// maximum and inserting happen inside one IMMEDIATE transaction, so two
    /// concurrent saves for the same tenant serialize on the write lock and
    /// can never be handed the same id. Nothing is visible until commit.
    pub fn save_receipt(&self, partition: Partition, receipt: &ExtractedReceipt) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut max_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        partition.push_param(&mut max_params);
        let max_local: i64 = tx.query_row(
            &format!(
                "SELECT COALESCE(MAX(n.user_note_id), 0) FROM notas n WHERE 1 = 1 {}",
                partition.condition("n")
            ),
            max_params
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<&dyn rusqlite::ToSql>>()
                .as_slice(),
            |row| row.get(0),
        )?;
        let local_id = max_local + 1;

        let document = serde_json::to_string(&receipt.document)?;
        match partition.owner() {
            Some(user_id) => tx.execute(
                "INSERT INTO notas (cnpj, emissao, dados_nota, user_id, user_note_id)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    receipt.merchant_id,
                    receipt.issued_at,
                    document,
                    user_id,
                    local_id
                ],
            )?,
            None => tx.execute(
                "INSERT INTO notas (cnpj, emissao, dados_nota, user_note_id) VALUES (?, ?, ?, ?)",
                params![receipt.merchant_id, receipt.issued_at, document, local_id],
            )?,
        };
        let nota_id = tx.last_insert_rowid();

        {
            let sql = match partition.owner() {
                Some(_) => {
                    "INSERT INTO produtos (nota_id, produto_id, nome, categoria, quantidade,
                     unidade, valor_unitario, valor_total, user_id)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                }
                None => {
                    "INSERT INTO produtos (nota_id, produto_id, nome, categoria, quantidade,
                     unidade, valor_unitario, valor_total)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
                }
            };
            let mut stmt = tx.prepare(sql)?;
            for item in &receipt.items {
                let mut item_params: Vec<Box<dyn rusqlite::ToSql>> = vec![
                    Box::new(nota_id),
                    Box::new(item.external_id.clone()),
                    Box::new(item.name.clone()),
                    Box::new(item.category.clone()),
                    Box::new(item.quantity.clone()),
                    Box::new(item.unit.clone()),
                    Box::new(item.unit_price.clone()),
                    Box::new(item.total_price.clone()),
                ];
                partition.push_param(&mut item_params);
                let refs: Vec<&dyn rusqlite::ToSql> =
                    item_params.iter().map(|p| p.as_ref()).collect();
                stmt.execute(refs.as_slice())?;
            }
        }

        tx.commit()?;
        debug!(
            nota_id,
            local_id,
            items = receipt.items.len(),
            "Receipt saved"
        );
        Ok(local_id)
    }

    /// List a partition's receipts in insertion order
    pub fn list_receipts(&self, partition: Partition) -> Result<Vec<ReceiptSummary>> {
        let conn = self.conn()?;
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        partition.push_param(&mut query_params);

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&format!(
            "SELECT n.user_note_id, n.cnpj, n.emissao FROM notas n
             WHERE 1 = 1 {} ORDER BY n.id",
            partition.condition("n")
        ))?;
        let receipts = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok(ReceiptSummary {
                    local_id: row.get(0)?,
                    merchant_id: row.get(1)?,
                    issued_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(receipts)
    }

    /// Get a receipt by its tenant-local id together with its line items
    pub fn get_receipt(
        &self,
        partition: Partition,
        local_id: i64,
    ) -> Result<Option<(Receipt, Vec<LineItem>)>> {
        let conn = self.conn()?;
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(local_id)];
        partition.push_param(&mut query_params);
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let receipt = conn
            .query_row(
                &format!(
                    "SELECT n.id, n.user_note_id, n.cnpj, n.emissao, n.dados_nota FROM notas n
                     WHERE n.user_note_id = ? {}",
                    partition.condition("n")
                ),
                param_refs.as_slice(),
                |row| {
                    let raw: String = row.get(4)?;
                    Ok(Receipt {
                        id: row.get(0)?,
                        local_id: row.get(1)?,
                        merchant_id: row.get(2)?,
                        issued_at: row.get(3)?,
                        document: serde_json::from_str(&raw)
                            .unwrap_or(serde_json::Value::String(raw)),
                    })
                },
            )
            .optional()?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT produto_id, nome, categoria, quantidade, unidade, valor_unitario, valor_total
             FROM produtos WHERE nota_id = ? ORDER BY id",
        )?;
        let items = stmt
            .query_map(params![receipt.id], Self::row_to_line_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some((receipt, items)))
    }

    /// Number of receipts in a partition
    pub fn count_receipts(&self, partition: Partition) -> Result<i64> {
        let conn = self.conn()?;
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        partition.push_param(&mut query_params);
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();
        let count = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM notas n WHERE 1 = 1 {}",
                partition.condition("n")
            ),
            param_refs.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Helper to convert a produtos row (7 leading columns) to a LineItem
    fn row_to_line_item(row: &rusqlite::Row) -> rusqlite::Result<LineItem> {
        let text = |idx: usize| -> rusqlite::Result<String> {
            Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
        };
        Ok(LineItem {
            external_id: text(0)?,
            name: text(1)?,
            category: text(2)?,
            quantity: text(3)?,
            unit: text(4)?,
            unit_price: text(5)?,
            total_price: text(6)?,
        })
    }
}
