//! Ratewatch FX
//!
//! The service layer over a [`ratewatch_store::RateStore`].
//!
//! # Features
//!
//! - Currency pair registry with exact-match lookups
//! - Daily rate ingestion with upsert-by-date
//! - Trailing 7-day windows, averages and ranges
//! - Daily snapshots across every pair quoted on a date
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratewatch_fx::{RateService, RateServiceConfig};
//! use ratewatch_store::InMemoryRateStore;
//!
//! let service = RateService::new(Arc::new(InMemoryRateStore::new()), RateServiceConfig::default());
//!
//! service.ingestor().ingest_rate("USD", "EUR", date, 0.92).await?;
//! let trend = service.aggregator().trend_statistics(Some("USD"), Some("EUR")).await?;
//! ```

pub mod engine;
pub mod registry;
pub mod ingestion;
pub mod aggregator;

pub use engine::{RateService, RateServiceConfig};
pub use registry::{CurrencyRegistry, PairRegistration};
pub use ingestion::{RateIngestor, RateSubmission, RateValue, ValidatedRate};
pub use aggregator::{
    DailySnapshot, SnapshotRateBasis, SnapshotRow, TrailingWindow, TrendAggregator,
    TrendStatistics,
};
