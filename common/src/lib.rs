//! Ratewatch Common Types
//!
//! Shared types used across the ratewatch crates: identifiers, currency
//! pairs and rate observations, the error taxonomy, and calendar helpers.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
