//! In-memory [`RateStore`] backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::debug;

use ratewatch_common::{CurrencyCode, CurrencyId, CurrencyPair, RateId, RateObservation};

use crate::error::{StoreError, StoreResult};
use crate::store::{RateStore, Upserted};

#[derive(Debug, Default)]
struct Tables {
    pairs: BTreeMap<CurrencyId, CurrencyPair>,
    rates: BTreeMap<(CurrencyId, NaiveDate), RateObservation>,
    last_pair_id: i64,
    last_rate_id: i64,
}

impl Tables {
    fn find_pair(&self, domain: &CurrencyCode, codomain: &CurrencyCode) -> Option<&CurrencyPair> {
        self.pairs.values().find(|p| p.matches(domain, codomain))
    }

    fn insert_pair(&mut self, domain: &CurrencyCode, codomain: &CurrencyCode) -> CurrencyPair {
        self.last_pair_id += 1;
        let pair = CurrencyPair::new(
            CurrencyId::new(self.last_pair_id),
            domain.clone(),
            codomain.clone(),
        );
        self.pairs.insert(pair.currency_id, pair.clone());
        pair
    }
}

/// Store backed by ordered maps behind a lock.
///
/// Identifiers are never reused, matching an autoincrement column.
#[derive(Debug, Default)]
pub struct InMemoryRateStore {
    tables: RwLock<Tables>,
}

impl InMemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored observations.
    pub fn observation_count(&self) -> usize {
        self.tables.read().rates.len()
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn insert_pair(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
    ) -> StoreResult<CurrencyPair> {
        let mut tables = self.tables.write();

        if tables.find_pair(domain, codomain).is_some() {
            return Err(StoreError::Conflict(format!(
                "currency pair {}/{} already exists",
                domain, codomain
            )));
        }

        Ok(tables.insert_pair(domain, codomain))
    }

    async fn find_pair(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
    ) -> StoreResult<Option<CurrencyPair>> {
        Ok(self.tables.read().find_pair(domain, codomain).cloned())
    }

    async fn delete_pair(&self, currency_id: CurrencyId) -> StoreResult<Option<CurrencyPair>> {
        let mut tables = self.tables.write();

        let removed = tables.pairs.remove(&currency_id);
        if removed.is_some() {
            let before = tables.rates.len();
            tables.rates.retain(|(owner, _), _| *owner != currency_id);
            debug!(
                currency_id = %currency_id,
                observations = before - tables.rates.len(),
                "Cascaded pair deletion"
            );
        }

        Ok(removed)
    }

    async fn list_pairs(&self) -> StoreResult<Vec<CurrencyPair>> {
        Ok(self.tables.read().pairs.values().cloned().collect())
    }

    async fn upsert_observation(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
        date: NaiveDate,
        rate: f64,
    ) -> StoreResult<Upserted> {
        let mut tables = self.tables.write();

        let (pair, pair_created) = match tables.find_pair(domain, codomain) {
            Some(pair) => (pair.clone(), false),
            None => (tables.insert_pair(domain, codomain), true),
        };

        let key = (pair.currency_id, date);
        let observation_created = !tables.rates.contains_key(&key);

        let observation = if observation_created {
            tables.last_rate_id += 1;
            let observation =
                RateObservation::new(RateId::new(tables.last_rate_id), pair.currency_id, date, rate);
            tables.rates.insert(key, observation.clone());
            observation
        } else {
            let existing = tables
                .rates
                .get_mut(&key)
                .ok_or_else(|| StoreError::Corrupt(format!("observation for {} vanished", pair)))?;
            existing.rate = rate;
            existing.clone()
        };

        Ok(Upserted {
            pair,
            observation,
            pair_created,
            observation_created,
        })
    }

    async fn observations_after(
        &self,
        currency_id: CurrencyId,
        after: NaiveDate,
    ) -> StoreResult<Vec<RateObservation>> {
        let tables = self.tables.read();

        Ok(tables
            .rates
            .range((currency_id, after)..)
            .take_while(|((owner, _), _)| *owner == currency_id)
            .filter(|((_, date), _)| *date > after)
            .map(|(_, obs)| obs.clone())
            .collect())
    }

    async fn pairs_with_observation_on(&self, date: NaiveDate) -> StoreResult<Vec<CurrencyPair>> {
        let tables = self.tables.read();

        Ok(tables
            .pairs
            .values()
            .filter(|p| tables.rates.contains_key(&(p.currency_id, date)))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        // For in-memory storage, always healthy
        Ok(())
    }
}
