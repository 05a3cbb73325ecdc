//! Price advisory over a tenant's purchase history

use tracing::{info, warn};

use crate::ai::{AIBackend, AIClient};
use crate::error::{Error, Result};
use crate::models::AdvisoryItem;

/// Message when no line item qualifies for comparison
pub const NO_ADVISORY_ITEMS: &str = "Nenhum produto encontrado para consultoria.";

const SUMMARY_HEADER: &str = "Lista de Produtos, CNPJ e Preço Unitário:\n";

/// Plain-text itemized summary fed to the advisory prompt
pub fn build_summary(items: &[AdvisoryItem]) -> String {
    let mut summary = String::from(SUMMARY_HEADER);
    for item in items {
        summary.push_str(&format!(
            "- Produto: {}; Mercado/Emissor: {}; Preço Unit.: {}\n",
            item.name, item.merchant_id, item.unit_price
        ));
    }
    summary
}

#[derive(Clone)]
pub struct AdvisoryGenerator {
    ai: AIClient,
}

impl AdvisoryGenerator {
    pub fn new(ai: AIClient) -> Self {
        Self { ai }
    }

    /// Ask the model for a comparative price analysis of `items`
    ///
    /// Every failure, including having nothing to compare, is an
    /// `Error::Advisory` carrying the user-facing message.
    pub async fn generate(&self, items: &[AdvisoryItem]) -> Result<String> {
        if items.is_empty() {
            return Err(Error::Advisory(NO_ADVISORY_ITEMS.to_string()));
        }

        let summary = build_summary(items);
        match self.ai.price_advisory(&summary).await {
            Ok(text) => {
                info!(items = items.len(), chars = text.len(), "Advisory generated");
                Ok(text)
            }
            Err(e) => {
                warn!(error = %e, "Advisory call failed");
                Err(Error::Advisory(format!("Erro ao gerar consultoria: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn item(name: &str, cnpj: &str, price: &str) -> AdvisoryItem {
        AdvisoryItem {
            name: name.into(),
            merchant_id: cnpj.into(),
            unit_price: price.into(),
        }
    }

    #[test]
    fn test_build_summary() {
        let summary = build_summary(&[
            item("Arroz", "11.111.111/0001-11", "5.00"),
            item("Arroz", "22.222.222/0001-22", "6.50"),
        ]);
        assert_eq!(
            summary,
            "Lista de Produtos, CNPJ e Preço Unitário:\n\
             - Produto: Arroz; Mercado/Emissor: 11.111.111/0001-11; Preço Unit.: 5.00\n\
             - Produto: Arroz; Mercado/Emissor: 22.222.222/0001-22; Preço Unit.: 6.50\n"
        );
    }

    #[tokio::test]
    async fn test_generate() {
        let mock = MockBackend::new().with_advisory("  Compre no atacado.  ");
        let generator = AdvisoryGenerator::new(mock.clone().into());

        let text = generator
            .generate(&[item("Feijão", "1", "8,00")])
            .await
            .unwrap();
        assert_eq!(text, "Compre no atacado.");
        assert!(mock.last_summary().unwrap().contains("Produto: Feijão"));
    }

    #[tokio::test]
    async fn test_no_items() {
        let mock = MockBackend::new();
        let generator = AdvisoryGenerator::new(mock.clone().into());
        let err = generator.generate(&[]).await.unwrap_err();
        assert_eq!(err.label(), "AdvisoryError");
        assert_eq!(err.to_string(), NO_ADVISORY_ITEMS);
        assert!(mock.last_summary().is_none());
    }

    #[tokio::test]
    async fn test_model_failures() {
        let empty = AdvisoryGenerator::new(MockBackend::new().with_advisory("").into());
        let err = empty.generate(&[item("a", "1", "1")]).await.unwrap_err();
        assert_eq!(err.label(), "AdvisoryError");

        let slow = AdvisoryGenerator::new(MockBackend::new().timing_out(2).into());
        let err = slow.generate(&[item("a", "1", "1")]).await.unwrap_err();
        assert!(matches!(err, Error::Advisory(ref m) if m.starts_with("Erro ao gerar consultoria")));
    }
}
