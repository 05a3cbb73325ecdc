//! Operation surface for front ends
//!
//! `NotaService` wires the account store, storage, extraction pipeline and
//! advisory generator together. Every operation takes the caller's `Session`
//! explicitly and returns a typed `Result`; `Operation::outcome` turns that
//! into the tagged, human-readable `Outcome` a front end prints.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::accounts::AccountStore;
use crate::advisory::AdvisoryGenerator;
use crate::ai::AIClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::ReceiptExtractor;
use crate::fetch::PageFetcher;
use crate::models::{FinancialReport, LineItem, Receipt, ReceiptSummary};
use crate::session::{Session, NOT_LOGGED_IN};
use crate::storage::Storage;

pub const RECEIPT_NOT_FOUND: &str = "Nota não encontrada ou não pertence a você.";
pub const RECEIPT_ADDED: &str = "Nota adicionada com sucesso!";
pub const LOGIN_FAILED: &str = "Login inválido. Verifique usuário e senha.";
pub const ALREADY_LOGGED_OUT: &str = "Você já está deslogado.";
pub const NO_RECEIPTS: &str = "Nenhuma nota cadastrada.";

/// User-facing operations, each with its own failure prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    Logout,
    DeleteAccount,
    AddReceipt,
    ListReceipts,
    GetReceipt,
    ComputeFinancials,
    GenerateAdvisory,
}

impl Operation {
    pub fn error_prefix(&self) -> &'static str {
        match self {
            Self::Register => "Erro ao registrar",
            Self::Login => "Erro ao fazer login",
            Self::Logout => "Erro ao sair",
            Self::DeleteAccount => "Erro ao excluir conta",
            Self::AddReceipt => "Erro ao adicionar a nota",
            Self::ListReceipts => "Erro ao listar notas",
            Self::GetReceipt => "Erro ao buscar a nota",
            Self::ComputeFinancials => "Erro ao calcular o relatório",
            Self::GenerateAdvisory => "Erro ao gerar consultoria",
        }
    }

    /// Render a typed result as the message shown to the user
    ///
    /// Failures whose message is already written for users (conflicts,
    /// authorization, lookups, advisory) are shown as-is; the rest get the
    /// operation prefix.
    pub fn outcome(self, result: Result<String>) -> Outcome {
        match result {
            Ok(message) => Outcome::Success(message),
            Err(err) => {
                let message = match &err {
                    Error::Conflict(m)
                    | Error::Authorization(m)
                    | Error::NotFound(m)
                    | Error::Advisory(m) => m.clone(),
                    other => format!("{}: {}", self.error_prefix(), other),
                };
                Outcome::Failure {
                    label: err.label(),
                    message,
                }
            }
        }
    }
}

/// Tagged result of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure {
        /// Error category, e.g. `FetchError`
        label: &'static str,
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Success(m) => m,
            Outcome::Failure { message, .. } => message,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

pub struct NotaService {
    storage: Storage,
    accounts: AccountStore,
    extractor: ReceiptExtractor,
    advisor: AdvisoryGenerator,
}

impl NotaService {
    pub fn new(
        storage: Storage,
        enrollment_passphrase: &str,
        fetcher: PageFetcher,
        ai: AIClient,
    ) -> Self {
        let accounts = AccountStore::new(storage.accounts().clone(), enrollment_passphrase);
        Self {
            storage,
            accounts,
            extractor: ReceiptExtractor::new(fetcher, ai.clone()),
            advisor: AdvisoryGenerator::new(ai),
        }
    }

    /// Open storage and build clients from resolved configuration
    pub fn from_config(config: &Config, db_passphrase: Option<String>) -> Result<Self> {
        let storage = Storage::open(&config.storage, db_passphrase)?;
        let fetcher = PageFetcher::from_config(&config.fetch)?;
        let ai = AIClient::from_config(&config.ai)?;
        Ok(Self::new(
            storage,
            &config.enrollment.passphrase,
            fetcher,
            ai,
        ))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn ai(&self) -> &AIClient {
        self.extractor.ai()
    }

    /// Create an account and log it in
    pub fn register(&self, username: &str, password: &str, shared_secret: &str) -> Result<Session> {
        let tenant_id = self.accounts.register(username, password, shared_secret)?;
        if let Err(e) = self.storage.provision(tenant_id, username) {
            warn!(tenant_id, error = %e, "Provisioning failed, rolling back account");
            self.accounts.delete(tenant_id)?;
            return Err(e);
        }
        Ok(Session::logged_in(tenant_id, username))
    }

    /// `None` on a wrong username or password
    pub fn login(&self, username: &str, password: &str) -> Result<Option<Session>> {
        let session = self
            .accounts
            .login(username, password)?
            .map(|tenant| Session::logged_in(tenant.id, tenant.username));
        if let Some(Session::LoggedIn { tenant_id, .. }) = &session {
            info!(tenant_id, "Logged in");
        }
        Ok(session)
    }

    /// Anonymous session plus the farewell message
    pub fn logout(&self, session: &Session) -> (Session, String) {
        let message = match session.username() {
            Some(name) => format!("Logout efetuado. Até mais, {}!", name),
            None => ALREADY_LOGGED_OUT.to_string(),
        };
        (Session::Anonymous, message)
    }

    /// Delete the logged-in account and every receipt it owns
    ///
    /// Receipt storage goes first; if it cannot be removed the account stays
    /// so the deletion can be retried.
    pub fn delete_account(&self, session: &Session) -> Result<String> {
        let (tenant_id, username) = self.tenant(session)?;
        self.storage.remove_tenant(tenant_id, username)?;
        self.accounts.delete(tenant_id)?;
        Ok(format!("Conta de {} excluída com sucesso!", username))
    }

    /// Fetch, extract and persist a receipt, returning its tenant-local id
    ///
    /// Storage is touched only after extraction succeeded.
    pub async fn add_receipt(&self, session: &Session, url: &str) -> Result<i64> {
        let (tenant_id, username) = self.tenant(session)?;
        let receipt = self.extractor.extract(url).await?;

        let (db, partition) = self.storage.receipts_for(tenant_id, username)?;
        let local_id = db.save_receipt(partition, &receipt)?;
        info!(tenant_id, receipt_id = local_id, items = receipt.items.len(), "Receipt added");
        Ok(local_id)
    }

    pub fn count_receipts(&self, session: &Session) -> Result<i64> {
        let (tenant_id, username) = self.tenant(session)?;
        let (db, partition) = self.storage.receipts_for(tenant_id, username)?;
        db.count_receipts(partition)
    }

    pub fn list_receipts(&self, session: &Session) -> Result<Vec<ReceiptSummary>> {
        let (tenant_id, username) = self.tenant(session)?;
        let (db, partition) = self.storage.receipts_for(tenant_id, username)?;
        db.list_receipts(partition)
    }

    pub fn get_receipt(&self, session: &Session, local_id: i64) -> Result<(Receipt, Vec<LineItem>)> {
        let (tenant_id, username) = self.tenant(session)?;
        let (db, partition) = self.storage.receipts_for(tenant_id, username)?;
        db.get_receipt(partition, local_id)?
            .ok_or_else(|| Error::NotFound(RECEIPT_NOT_FOUND.to_string()))
    }

    /// Spending report over all receipts (`None`) or the given tenant-local ids
    pub fn compute_financials(
        &self,
        session: &Session,
        receipt_ids: Option<&BTreeSet<i64>>,
    ) -> Result<FinancialReport> {
        let (tenant_id, username) = self.tenant(session)?;
        let (db, partition) = self.storage.receipts_for(tenant_id, username)?;
        db.compute_financials(partition, receipt_ids)
    }

    pub async fn generate_advisory(&self, session: &Session) -> Result<String> {
        let (tenant_id, username) = self.tenant(session)?;
        let (db, partition) = self.storage.receipts_for(tenant_id, username)?;
        let items = db.advisory_items(partition)?;
        self.advisor.generate(&items).await
    }

    /// Resolve the session to a live account
    ///
    /// A session naming a deleted account counts as logged out.
    fn tenant<'s>(&self, session: &'s Session) -> Result<(i64, &'s str)> {
        let (tenant_id, username) = session.require()?;
        match self.accounts.get(tenant_id)? {
            Some(tenant) if tenant.username == username => Ok((tenant_id, username)),
            _ => Err(Error::Authorization(NOT_LOGGED_IN.to_string())),
        }
    }
}

/// Parse a comma-separated id list, keeping only plain digit entries
///
/// Returns `None` (every receipt) when nothing usable is left.
pub fn parse_id_list(text: &str) -> Option<BTreeSet<i64>> {
    let ids: BTreeSet<i64> = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

pub fn render_receipt_list(receipts: &[ReceiptSummary]) -> String {
    if receipts.is_empty() {
        return NO_RECEIPTS.to_string();
    }
    receipts
        .iter()
        .map(|r| {
            format!(
                "ID: {}, CNPJ: {}, Emissão: {}",
                r.local_id, r.merchant_id, r.issued_at
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_receipt(receipt: &Receipt, items: &[LineItem]) -> String {
    let mut out = format!(
        "Nota Fiscal:\nID: {}, CNPJ: {}, Emissão: {}\n\nProdutos:\n",
        receipt.local_id, receipt.merchant_id, receipt.issued_at
    );
    for item in items {
        out.push_str(&format!(
            "  - Nome: {}, Categoria: {}, Quantidade: {}, Unidade: {}, Valor Unit.: {}, Valor Total: {}\n",
            item.name, item.category, item.quantity, item.unit, item.unit_price, item.total_price
        ));
    }
    out
}

/// Report text; categories are listed by descending total
pub fn render_report(report: &FinancialReport) -> String {
    let mut categories = report.category_totals.clone();
    categories.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let category_lines = categories
        .iter()
        .map(|c| format!("{}: R$ {:.2}", c.category, c.total))
        .collect::<Vec<_>>()
        .join("\n");
    let top_lines = report
        .top_items
        .iter()
        .map(|i| format!("{}: R$ {:.2}", i.name, i.total))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Categorias mais compradas:\n{}\n\nTop 10 itens mais caros:\n{}\n\nValor total: R$ {:.2}",
        category_lines, top_lines, report.grand_total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryTotal, TopItem};

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(""), None);
        assert_eq!(parse_id_list("  "), None);
        assert_eq!(parse_id_list("a, b"), None);
        assert_eq!(parse_id_list("1, 3,x,-2, 3"), Some(BTreeSet::from([1, 3])));
    }

    #[test]
    fn test_outcome_rendering() {
        let ok = Operation::AddReceipt.outcome(Ok(RECEIPT_ADDED.to_string()));
        assert!(ok.is_success());
        assert_eq!(ok.to_string(), RECEIPT_ADDED);

        let fetch = Operation::AddReceipt.outcome(Err(Error::Fetch("404".into())));
        assert_eq!(
            fetch,
            Outcome::Failure {
                label: "FetchError",
                message: "Erro ao adicionar a nota: 404".into()
            }
        );

        let auth = Operation::ListReceipts.outcome(Err(Error::Authorization(NOT_LOGGED_IN.into())));
        assert_eq!(auth.message(), NOT_LOGGED_IN);

        let missing = Operation::GetReceipt.outcome(Err(Error::NotFound(RECEIPT_NOT_FOUND.into())));
        assert_eq!(missing.message(), RECEIPT_NOT_FOUND);
        assert!(!missing.is_success());
    }

    #[test]
    fn test_render_receipt_list() {
        assert_eq!(render_receipt_list(&[]), NO_RECEIPTS);
        let text = render_receipt_list(&[
            ReceiptSummary {
                local_id: 1,
                merchant_id: "A".into(),
                issued_at: "2024-01-01".into(),
            },
            ReceiptSummary {
                local_id: 2,
                merchant_id: "B".into(),
                issued_at: "2024-01-02".into(),
            },
        ]);
        assert_eq!(
            text,
            "ID: 1, CNPJ: A, Emissão: 2024-01-01\nID: 2, CNPJ: B, Emissão: 2024-01-02"
        );
    }

    #[test]
    fn test_render_receipt() {
        let receipt = Receipt {
            id: 10,
            local_id: 1,
            merchant_id: "A".into(),
            issued_at: "2024-01-01".into(),
            document: serde_json::json!({}),
        };
        let item = LineItem {
            external_id: "1".into(),
            name: "Arroz".into(),
            category: "Food".into(),
            quantity: "2".into(),
            unit: "UN".into(),
            unit_price: "5.00".into(),
            total_price: "10.00".into(),
        };
        let text = render_receipt(&receipt, &[item]);
        assert!(text.starts_with("Nota Fiscal:\nID: 1, CNPJ: A, Emissão: 2024-01-01\n\nProdutos:\n"));
        assert!(text.contains(
            "  - Nome: Arroz, Categoria: Food, Quantidade: 2, Unidade: UN, Valor Unit.: 5.00, Valor Total: 10.00\n"
        ));
    }

    #[test]
    fn test_render_report() {
        let report = FinancialReport {
            category_totals: vec![
                CategoryTotal {
                    category: "Limpeza".into(),
                    total: 3.5,
                },
                CategoryTotal {
                    category: "Food".into(),
                    total: 15.0,
                },
            ],
            top_items: vec![
                TopItem {
                    name: "item2".into(),
                    total: 10.0,
                },
                TopItem {
                    name: "item1".into(),
                    total: 5.0,
                },
            ],
            grand_total: 18.5,
            skipped_items: 0,
        };
        assert_eq!(
            render_report(&report),
            "Categorias mais compradas:\nFood: R$ 15.00\nLimpeza: R$ 3.50\n\n\
             Top 10 itens mais caros:\nitem2: R$ 10.00\nitem1: R$ 5.00\n\n\
             Valor total: R$ 18.50"
        );
    }

    #[test]
    fn test_render_empty_report() {
        assert_eq!(
            render_report(&FinancialReport::default()),
            "Categorias mais compradas:\n\n\nTop 10 itens mais caros:\n\n\nValor total: R$ 0.00"
        );
    }
}
