//! Daily rate ingestion with upsert-by-date.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, instrument};

use ratewatch_common::{
    parse_iso_date, CurrencyCode, RateObservation, RatewatchError, RejectionReason, Result,
};
use ratewatch_store::RateStore;

use crate::registry::required_code;

/// A rate as sent by a client: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Number(f64),
    Text(String),
}

impl RateValue {
    fn to_finite(&self) -> Option<f64> {
        let value = match self {
            RateValue::Number(n) => *n,
            RateValue::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RateValue {
    fn from(value: f64) -> Self {
        RateValue::Number(value)
    }
}

/// Unvalidated body of a rate submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateSubmission {
    pub domain: Option<String>,
    pub codomain: Option<String>,
    pub date: Option<String>,
    pub rate: Option<RateValue>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRate {
    pub domain: CurrencyCode,
    pub codomain: CurrencyCode,
    pub date: NaiveDate,
    pub rate: f64,
}

impl RateSubmission {
    /// Check every field, reporting all problems together.
    pub fn validate(&self) -> Result<ValidatedRate> {
        let mut reasons = Vec::new();

        let date = match self.date.as_deref() {
            None => {
                reasons.push(RejectionReason::required("date"));
                None
            }
            Some(raw) => parse_iso_date("date", raw.trim())
                .map_err(|reason| reasons.push(reason))
                .ok(),
        };

        let domain = required_code("domain", self.domain.as_deref(), &mut reasons);
        let codomain = required_code("codomain", self.codomain.as_deref(), &mut reasons);

        let rate = match &self.rate {
            None => {
                reasons.push(RejectionReason::required("rate"));
                None
            }
            Some(value) => {
                let parsed = value.to_finite();
                if parsed.is_none() {
                    reasons.push(RejectionReason::with_field(
                        "INVALID_NUMBER",
                        "A valid number is required.",
                        "rate",
                    ));
                }
                parsed
            }
        };

        match (domain, codomain, date, rate) {
            (Some(domain), Some(codomain), Some(date), Some(rate)) if reasons.is_empty() => {
                Ok(ValidatedRate {
                    domain,
                    codomain,
                    date,
                    rate,
                })
            }
            _ => Err(RatewatchError::Validation(reasons)),
        }
    }
}

/// Records daily rates, registering unseen pairs on the way.
pub struct RateIngestor {
    store: Arc<dyn RateStore>,
}

impl RateIngestor {
    /// Create an ingestor over a store.
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store }
    }

    /// Validate and record a submission.
    ///
    /// Nothing is written unless the whole submission is valid.
    pub async fn ingest(&self, submission: &RateSubmission) -> Result<RateObservation> {
        let validated = submission.validate()?;
        self.ingest_validated(validated).await
    }

    /// Record a rate for typed inputs.
    pub async fn ingest_rate(
        &self,
        domain: &str,
        codomain: &str,
        date: NaiveDate,
        rate: f64,
    ) -> Result<RateObservation> {
        let mut reasons = Vec::new();
        let domain = required_code("domain", Some(domain), &mut reasons);
        let codomain = required_code("codomain", Some(codomain), &mut reasons);
        if !rate.is_finite() {
            reasons.push(RejectionReason::with_field(
                "INVALID_NUMBER",
                "A valid number is required.",
                "rate",
            ));
        }

        match (domain, codomain) {
            (Some(domain), Some(codomain)) if reasons.is_empty() => {
                self.ingest_validated(ValidatedRate {
                    domain,
                    codomain,
                    date,
                    rate,
                })
                .await
            }
            _ => Err(RatewatchError::Validation(reasons)),
        }
    }

    /// Find-or-create the pair, then insert or overwrite the day's rate.
    #[instrument(skip(self), fields(pair = %format!("{}/{}", rate.domain, rate.codomain), date = %rate.date))]
    pub async fn ingest_validated(&self, rate: ValidatedRate) -> Result<RateObservation> {
        let upserted = self
            .store
            .upsert_observation(&rate.domain, &rate.codomain, rate.date, rate.rate)
            .await?;

        if upserted.pair_created {
            info!(currency_id = %upserted.pair.currency_id, "Registered pair on first rate");
        }

        info!(
            currency_rate_id = %upserted.observation.currency_rate_id,
            rate = upserted.observation.rate,
            overwritten = !upserted.observation_created,
            "Rate recorded"
        );

        Ok(upserted.observation)
    }
}
