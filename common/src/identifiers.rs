//! Identifier types for ratewatch records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a registered currency pair.
///
/// Assigned by the store, strictly increasing in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyId(i64);

impl CurrencyId {
    /// Wrap a raw identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<i64> for CurrencyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a single rate observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateId(i64);

impl RateId {
    /// Wrap a raw identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RateId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
