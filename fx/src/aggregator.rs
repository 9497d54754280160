//! Trailing-window trend statistics and daily snapshots.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, instrument};

use ratewatch_common::{
    parse_calendar_date, trailing_window_floor, Clock, CurrencyCode, CurrencyId, CurrencyPair,
    RateObservation, RatewatchError, RejectionReason, Result,
};
use ratewatch_store::RateStore;

/// Which day's rate a snapshot row reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotRateBasis {
    /// The rate recorded on the day the snapshot is computed.
    #[default]
    CallDate,
    /// The rate recorded on the requested snapshot date.
    RequestedDate,
}

impl SnapshotRateBasis {
    /// The date whose rate is reported.
    pub fn lookup_date(self, requested: NaiveDate, today: NaiveDate) -> NaiveDate {
        match self {
            SnapshotRateBasis::CallDate => today,
            SnapshotRateBasis::RequestedDate => requested,
        }
    }
}

/// Observations of one pair newer than seven days before `as_of`.
///
/// There is no upper bound: observations dated after `as_of` are included.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    pub pair: CurrencyPair,
    pub as_of: NaiveDate,
    pub observations: Vec<RateObservation>,
}

impl TrailingWindow {
    /// Arithmetic mean of the rates, `None` for an empty window.
    pub fn average(&self) -> Option<f64> {
        average(&self.observations)
    }

    /// Highest minus lowest rate, `None` for an empty window.
    pub fn range(&self) -> Option<f64> {
        range(&self.observations)
    }

    /// The observation dated exactly `date`, if it falls in the window.
    pub fn rate_on(&self, date: NaiveDate) -> Option<&RateObservation> {
        self.observations.iter().find(|o| o.date == date)
    }
}

/// Mean of the observed rates.
pub fn average(observations: &[RateObservation]) -> Option<f64> {
    if observations.is_empty() {
        return None;
    }
    let sum: f64 = observations.iter().map(|o| o.rate).sum();
    Some(sum / observations.len() as f64)
}

/// Spread between the highest and lowest observed rate.
pub fn range(observations: &[RateObservation]) -> Option<f64> {
    let mut rates = observations.iter().map(|o| o.rate);
    let first = rates.next()?;
    let (min, max) = rates.fold((first, first), |(lo, hi), r| (lo.min(r), hi.max(r)));
    Some(max - min)
}

/// Trend figures over the current trailing window.
#[derive(Debug, Clone)]
pub struct TrendStatistics {
    pub pair: CurrencyPair,
    pub average: Option<f64>,
    pub range: Option<f64>,
    pub rates: Vec<RateObservation>,
}

/// One row of a daily snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub currency_id: CurrencyId,
    pub domain: CurrencyCode,
    pub codomain: CurrencyCode,
    pub rate: Option<f64>,
    pub average: Option<f64>,
}

/// Snapshot across every pair quoted on `date`.
#[derive(Debug, Clone)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub rows: Vec<SnapshotRow>,
}

/// Computes windows, statistics and snapshots from stored observations.
pub struct TrendAggregator {
    store: Arc<dyn RateStore>,
    clock: Arc<dyn Clock>,
    snapshot_basis: SnapshotRateBasis,
}

impl TrendAggregator {
    /// Create an aggregator.
    pub fn new(
        store: Arc<dyn RateStore>,
        clock: Arc<dyn Clock>,
        snapshot_basis: SnapshotRateBasis,
    ) -> Self {
        Self {
            store,
            clock,
            snapshot_basis,
        }
    }

    /// Current date according to the aggregator's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Observations of (domain, codomain) in the window ending at `as_of`,
    /// which defaults to today.
    ///
    /// Fails with `Validation` if either code is missing and `NotFound` if
    /// no pair matches exactly.
    #[instrument(skip(self))]
    pub async fn trailing_window(
        &self,
        domain: Option<&str>,
        codomain: Option<&str>,
        as_of: Option<NaiveDate>,
    ) -> Result<TrailingWindow> {
        let mut missing = Vec::new();
        if domain.is_none() {
            missing.push(RejectionReason::required("domain"));
        }
        if codomain.is_none() {
            missing.push(RejectionReason::required("codomain"));
        }
        let (Some(domain), Some(codomain)) = (domain, codomain) else {
            return Err(RatewatchError::Validation(missing));
        };

        let domain = CurrencyCode::unchecked(domain);
        let codomain = CurrencyCode::unchecked(codomain);

        let pair = self
            .store
            .find_pair(&domain, &codomain)
            .await?
            .ok_or_else(|| RatewatchError::NotFound(format!("currency pair {}/{}", domain, codomain)))?;

        let as_of = as_of.unwrap_or_else(|| self.today());
        self.window_for(pair, as_of).await
    }

    async fn window_for(&self, pair: CurrencyPair, as_of: NaiveDate) -> Result<TrailingWindow> {
        let observations = self
            .store
            .observations_after(pair.currency_id, trailing_window_floor(as_of))
            .await?;

        debug!(pair = %pair, as_of = %as_of, observations = observations.len(), "Loaded trailing window");

        Ok(TrailingWindow {
            pair,
            as_of,
            observations,
        })
    }

    /// Average and range over the window ending today.
    pub async fn trend_statistics(
        &self,
        domain: Option<&str>,
        codomain: Option<&str>,
    ) -> Result<TrendStatistics> {
        let window = self.trailing_window(domain, codomain, None).await?;

        Ok(TrendStatistics {
            average: window.average(),
            range: window.range(),
            pair: window.pair,
            rates: window.observations,
        })
    }

    /// One row per pair with a rate recorded on `date`.
    ///
    /// `date` must be `YYYY-MM-DD`. Each row carries the average of the
    /// window ending at `date` and the rate chosen by the configured
    /// [`SnapshotRateBasis`].
    #[instrument(skip(self))]
    pub async fn daily_snapshot(&self, date: Option<&str>) -> Result<DailySnapshot> {
        let raw = date.ok_or_else(|| RatewatchError::invalid(RejectionReason::required("date")))?;
        let date = parse_calendar_date("date", raw).map_err(RatewatchError::invalid)?;

        let lookup = self.snapshot_basis.lookup_date(date, self.today());
        let pairs = self.store.pairs_with_observation_on(date).await?;

        let mut rows = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let window = self.window_for(pair, date).await?;
            rows.push(SnapshotRow {
                rate: window.rate_on(lookup).map(|o| o.rate),
                average: window.average(),
                currency_id: window.pair.currency_id,
                domain: window.pair.domain,
                codomain: window.pair.codomain,
            });
        }

        Ok(DailySnapshot { date, rows })
    }
}
