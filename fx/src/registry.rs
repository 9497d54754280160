//! Currency pair registry.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use ratewatch_common::{
    CurrencyCode, CurrencyId, CurrencyPair, RatewatchError, RejectionReason, Result,
};
use ratewatch_store::RateStore;

/// Unvalidated body of a pair registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairRegistration {
    pub domain: Option<String>,
    pub codomain: Option<String>,
}

impl PairRegistration {
    /// Create a registration for two codes.
    pub fn new(domain: impl Into<String>, codomain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            codomain: Some(codomain.into()),
        }
    }

    /// Check both codes, reporting every bad field at once.
    pub fn validate(&self) -> Result<(CurrencyCode, CurrencyCode)> {
        let mut reasons = Vec::new();

        let domain = required_code("domain", self.domain.as_deref(), &mut reasons);
        let codomain = required_code("codomain", self.codomain.as_deref(), &mut reasons);

        match (domain, codomain) {
            (Some(domain), Some(codomain)) if reasons.is_empty() => Ok((domain, codomain)),
            _ => Err(RatewatchError::Validation(reasons)),
        }
    }
}

/// Parse a required code field, pushing a reason on failure.
pub(crate) fn required_code(
    field: &str,
    raw: Option<&str>,
    reasons: &mut Vec<RejectionReason>,
) -> Option<CurrencyCode> {
    match raw {
        None => {
            reasons.push(RejectionReason::required(field));
            None
        }
        Some(raw) => match CurrencyCode::parse(field, raw) {
            Ok(code) => Some(code),
            Err(reason) => {
                reasons.push(reason);
                None
            }
        },
    }
}

/// Registry of known currency pairs.
pub struct CurrencyRegistry {
    store: Arc<dyn RateStore>,
}

impl CurrencyRegistry {
    /// Create a registry over a store.
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store }
    }

    /// Register a new pair.
    ///
    /// Fails with `Validation` for bad codes and `Conflict` if the pair
    /// already exists.
    #[instrument(skip(self))]
    pub async fn register(&self, request: &PairRegistration) -> Result<CurrencyPair> {
        let (domain, codomain) = request.validate()?;

        let pair = self.store.insert_pair(&domain, &codomain).await?;

        info!(currency_id = %pair.currency_id, pair = %pair, "Registered currency pair");
        Ok(pair)
    }

    /// Exact-match lookup, no trimming or case folding.
    pub async fn find(&self, domain: &str, codomain: &str) -> Result<Option<CurrencyPair>> {
        let pair = self
            .store
            .find_pair(&CurrencyCode::unchecked(domain), &CurrencyCode::unchecked(codomain))
            .await?;
        Ok(pair)
    }

    /// Delete a pair and, with it, all of its rate observations.
    #[instrument(skip(self))]
    pub async fn delete(&self, currency_id: CurrencyId) -> Result<CurrencyPair> {
        let pair = self
            .store
            .delete_pair(currency_id)
            .await?
            .ok_or_else(|| RatewatchError::NotFound(format!("currency pair {}", currency_id)))?;

        info!(currency_id = %currency_id, pair = %pair, "Deleted currency pair");
        Ok(pair)
    }

    /// All pairs by ascending identifier.
    pub async fn list(&self) -> Result<Vec<CurrencyPair>> {
        Ok(self.store.list_pairs().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewatch_store::InMemoryRateStore;

    fn registry() -> CurrencyRegistry {
        CurrencyRegistry::new(Arc::new(InMemoryRateStore::new()))
    }

    #[tokio::test]
    async fn test_register_and_list_in_order() {
        let registry = registry();

        let eur = registry.register(&PairRegistration::new("USD", "EUR")).await.unwrap();
        let gbp = registry.register(&PairRegistration::new("USD", "GBP")).await.unwrap();

        let pairs = registry.list().await.unwrap();
        assert_eq!(pairs, vec![eur.clone(), gbp.clone()]);
        assert!(eur.currency_id < gbp.currency_id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let registry = registry();
        let original = registry.register(&PairRegistration::new("USD", "EUR")).await.unwrap();

        let result = registry.register(&PairRegistration::new("USD", "EUR")).await;
        assert!(matches!(result, Err(RatewatchError::Conflict(_))));

        assert_eq!(registry.list().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn test_register_reports_all_bad_fields() {
        let registry = registry();
        let request = PairRegistration {
            domain: None,
            codomain: Some("EURO".to_string()),
        };

        match registry.register(&request).await {
            Err(RatewatchError::Validation(reasons)) => {
                let fields: Vec<_> = reasons.iter().filter_map(|r| r.field.clone()).collect();
                assert_eq!(fields, vec!["domain", "codomain"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_is_exact() {
        let registry = registry();
        registry.register(&PairRegistration::new("USD", "EUR")).await.unwrap();

        assert!(registry.find("USD", "EUR").await.unwrap().is_some());
        assert!(registry.find("usd", "eur").await.unwrap().is_none());
        assert!(registry.find("US", "EUR").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let registry = registry();
        let result = registry.delete(CurrencyId::new(99)).await;
        assert!(matches!(result, Err(RatewatchError::NotFound(_))));
    }
}
