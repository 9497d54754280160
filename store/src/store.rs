//! The storage trait shared by all backends.

use async_trait::async_trait;
use chrono::NaiveDate;

use ratewatch_common::{CurrencyCode, CurrencyId, CurrencyPair, RateObservation};

use crate::error::StoreResult;

/// Outcome of [`RateStore::upsert_observation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    /// The pair the observation belongs to.
    pub pair: CurrencyPair,
    /// The observation as stored after the write.
    pub observation: RateObservation,
    /// The pair did not exist and was registered by this call.
    pub pair_created: bool,
    /// A new observation row was inserted rather than overwritten.
    pub observation_created: bool,
}

/// Persistence for currency pairs and their daily rates.
///
/// Backends enforce uniqueness of (domain, codomain) and of
/// (pair, date), and remove a pair's observations along with the pair.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Register a new pair. Fails with `Conflict` if it already exists.
    async fn insert_pair(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
    ) -> StoreResult<CurrencyPair>;

    /// Exact-match lookup.
    async fn find_pair(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
    ) -> StoreResult<Option<CurrencyPair>>;

    /// Remove a pair and its observations, returning what was removed.
    async fn delete_pair(&self, currency_id: CurrencyId) -> StoreResult<Option<CurrencyPair>>;

    /// All pairs by ascending identifier.
    async fn list_pairs(&self) -> StoreResult<Vec<CurrencyPair>>;

    /// Find-or-create the pair, then insert or overwrite the observation for
    /// `date`, as one atomic unit. An overwrite keeps the observation id.
    async fn upsert_observation(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
        date: NaiveDate,
        rate: f64,
    ) -> StoreResult<Upserted>;

    /// Observations of a pair dated strictly after `after`, oldest first.
    async fn observations_after(
        &self,
        currency_id: CurrencyId,
        after: NaiveDate,
    ) -> StoreResult<Vec<RateObservation>>;

    /// Pairs with an observation on `date`, by ascending identifier.
    async fn pairs_with_observation_on(&self, date: NaiveDate) -> StoreResult<Vec<CurrencyPair>>;

    /// Check the backend is reachable.
    async fn health_check(&self) -> StoreResult<()>;
}
