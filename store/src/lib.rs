//! Ratewatch Store
//!
//! Durable home of the currency registry and the daily rate observations.
//! [`RateStore`] is the seam the service talks to; [`SqliteRateStore`] is the
//! production backend and [`InMemoryRateStore`] mirrors its semantics for
//! tests and throwaway deployments.

pub mod store;
pub mod error;
pub mod memory;
pub mod sqlite;
mod migrations;

pub use store::{RateStore, Upserted};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRateStore;
pub use sqlite::{SqliteRateStore, SqliteStoreConfig};
