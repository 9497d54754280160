//! The rate service tying registry, ingestion and aggregation together.

use std::sync::Arc;

use ratewatch_common::{Clock, SystemClock};
use ratewatch_store::RateStore;

use crate::aggregator::{SnapshotRateBasis, TrendAggregator};
use crate::ingestion::RateIngestor;
use crate::registry::CurrencyRegistry;

/// Configuration for the rate service.
#[derive(Debug, Clone, Default)]
pub struct RateServiceConfig {
    /// Which day's rate daily snapshots report.
    pub snapshot_basis: SnapshotRateBasis,
}

/// The main rate service.
pub struct RateService {
    store: Arc<dyn RateStore>,
    registry: CurrencyRegistry,
    ingestor: RateIngestor,
    aggregator: TrendAggregator,
}

impl RateService {
    /// Create a service on the system clock.
    pub fn new(store: Arc<dyn RateStore>, config: RateServiceConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Create a service with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
        config: RateServiceConfig,
    ) -> Self {
        Self {
            registry: CurrencyRegistry::new(store.clone()),
            ingestor: RateIngestor::new(store.clone()),
            aggregator: TrendAggregator::new(store.clone(), clock, config.snapshot_basis),
            store,
        }
    }

    /// Pair registration, lookup and deletion.
    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    /// Rate ingestion.
    pub fn ingestor(&self) -> &RateIngestor {
        &self.ingestor
    }

    /// Windows, trend statistics and snapshots.
    pub fn aggregator(&self) -> &TrendAggregator {
        &self.aggregator
    }

    /// Check the backing store answers.
    pub async fn health_check(&self) -> ratewatch_common::Result<()> {
        Ok(self.store.health_check().await?)
    }
}
