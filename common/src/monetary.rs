//! Currency pairs and the rate observations recorded against them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RejectionReason;
use crate::identifiers::{CurrencyId, RateId};

/// Maximum length of a currency code.
pub const MAX_CODE_LEN: usize = 3;

/// A currency code such as `USD`.
///
/// Codes are compared exactly: no case folding and no partial matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Validate a code supplied by a client.
    ///
    /// Surrounding whitespace is trimmed. The result must be non-blank and at
    /// most [`MAX_CODE_LEN`] characters. `field` names the offending input in
    /// the rejection.
    pub fn parse(field: &str, raw: &str) -> Result<Self, RejectionReason> {
        let code = raw.trim();

        if code.is_empty() {
            return Err(RejectionReason::with_field(
                "BLANK",
                "This field may not be blank.",
                field,
            ));
        }

        if code.chars().count() > MAX_CODE_LEN {
            return Err(RejectionReason::with_field(
                "MAX_LENGTH",
                format!("Ensure this field has no more than {} characters.", MAX_CODE_LEN),
                field,
            ));
        }

        Ok(Self(code.to_string()))
    }

    /// Wrap a code without validating it.
    ///
    /// Used for codes read back from storage, which passed
    /// [`CurrencyCode::parse`] on the way in, and for exact-match lookups.
    pub fn unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered (domain, codomain) currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Store-assigned identifier.
    pub currency_id: CurrencyId,
    /// Currency being priced.
    pub domain: CurrencyCode,
    /// Currency the rate is expressed in.
    pub codomain: CurrencyCode,
}

impl CurrencyPair {
    /// Create a pair record.
    pub fn new(currency_id: CurrencyId, domain: CurrencyCode, codomain: CurrencyCode) -> Self {
        Self {
            currency_id,
            domain,
            codomain,
        }
    }

    /// Check whether this pair is exactly (domain, codomain).
    pub fn matches(&self, domain: &CurrencyCode, codomain: &CurrencyCode) -> bool {
        &self.domain == domain && &self.codomain == codomain
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.codomain)
    }
}

/// A daily rate recorded for a pair. At most one exists per (pair, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateObservation {
    /// Store-assigned identifier, kept when the rate is overwritten.
    pub currency_rate_id: RateId,
    /// Owning pair.
    pub currency_id: CurrencyId,
    /// Rate value. Positive in practice, never checked.
    pub rate: f64,
    /// Calendar day of the observation.
    pub date: NaiveDate,
}

impl RateObservation {
    /// Create an observation record.
    pub fn new(currency_rate_id: RateId, currency_id: CurrencyId, date: NaiveDate, rate: f64) -> Self {
        Self {
            currency_rate_id,
            currency_id,
            rate,
            date,
        }
    }
}
