//! Shared state handed to every request handler.

use std::sync::Arc;

use ratewatch_common::Clock;
use ratewatch_fx::{RateService, RateServiceConfig};
use ratewatch_store::RateStore;

use crate::config::{PaginationConfig, ServerConfig};
use crate::metrics::{Metrics, SharedMetrics};

/// Application state cloned into each handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RateService>,
    pub metrics: SharedMetrics,
    pub pagination: PaginationConfig,
}

impl AppState {
    /// Build state over a store using the system clock.
    pub fn new(store: Arc<dyn RateStore>, config: &ServerConfig) -> Self {
        let service = RateService::new(store, service_config(config));
        Self::from_service(service, config)
    }

    /// Build state with an explicit clock.
    pub fn with_clock(store: Arc<dyn RateStore>, clock: Arc<dyn Clock>, config: &ServerConfig) -> Self {
        let service = RateService::with_clock(store, clock, service_config(config));
        Self::from_service(service, config)
    }

    fn from_service(service: RateService, config: &ServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            metrics: Arc::new(Metrics::new()),
            pagination: config.pagination.clone(),
        }
    }
}

fn service_config(config: &ServerConfig) -> RateServiceConfig {
    RateServiceConfig {
        snapshot_basis: config.trend.snapshot_basis,
    }
}
