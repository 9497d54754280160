//! Ratewatch Server
//!
//! HTTP surface over the rate service: pair registration and deletion,
//! rate ingestion, trend queries and daily snapshots, all answered in a
//! uniform `{status, message, ...}` JSON envelope.

pub mod config;
pub mod envelope;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use envelope::{ApiError, ApiResponse};
pub use metrics::{Metrics, SharedMetrics};
pub use routes::router;
pub use state::AppState;
