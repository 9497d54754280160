//! Calendar utilities and constants for rate windows.

use chrono::{Days, NaiveDate, Utc};

use crate::error::RejectionReason;

/// Window and format constants.
pub mod constants {
    /// Length of the trailing trend window, in days.
    pub const TRAILING_WINDOW_DAYS: u64 = 7;

    /// Wire format of calendar dates.
    pub const DATE_FORMAT: &str = "%Y-%m-%d";
}

/// Source of "today".
pub trait Clock: Send + Sync {
    /// Current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Exclusive lower bound of the trailing window ending at `as_of`.
///
/// Observations strictly newer than this date belong to the window.
pub fn trailing_window_floor(as_of: NaiveDate) -> NaiveDate {
    as_of
        .checked_sub_days(Days::new(constants::TRAILING_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN)
}

fn invalid_date(field: &str) -> RejectionReason {
    RejectionReason::with_field(
        "INVALID_DATE",
        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
        field,
    )
}

/// Parse a strict `YYYY-MM-DD` date.
///
/// The shape is checked before the calendar, so `2024-1-5` and `2024-02-30`
/// are both rejected with a reason naming `field`.
pub fn parse_calendar_date(field: &str, raw: &str) -> Result<NaiveDate, RejectionReason> {
    if !is_date_shaped(raw) {
        return Err(invalid_date(field));
    }

    NaiveDate::parse_from_str(raw, constants::DATE_FORMAT).map_err(|_| invalid_date(field))
}

/// Parse an ISO date whose month and day may drop the leading zero.
///
/// Accepts `2024-01-05` and `2024-1-5`. The year is always four digits.
pub fn parse_iso_date(field: &str, raw: &str) -> Result<NaiveDate, RejectionReason> {
    let mut parts = raw.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid_date(field));
    };

    let digits = |part: &str, min: usize, max: usize| {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(year, 4, 4) || !digits(month, 1, 2) || !digits(day, 1, 2) {
        return Err(invalid_date(field));
    }

    match (year.parse(), month.parse(), day.parse()) {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| invalid_date(field)),
        _ => Err(invalid_date(field)),
    }
}

fn is_date_shaped(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
