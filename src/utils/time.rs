//! Time conversions shared by the provider models and the store.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::constants::MARKET_TIME_ZONE;
use crate::error::{Error, Result};

/// Convert a provider nanosecond epoch timestamp.
pub fn ns_to_datetime(ns: i64) -> Option<DateTime<Utc>> {
    let secs = ns.div_euclid(1_000_000_000);
    let nanos = ns.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Parse an ISO `YYYY-MM-DD` expiration date.
pub fn parse_expiration_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::Format(format!("Invalid expiration date '{}': {}", raw, e)))
}

/// An expiration date is stored as midnight in the exchange timezone.
pub fn expiration_to_datetime(date: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Format(format!("Invalid expiration date {}", date)))?;

    MARKET_TIME_ZONE
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Format(format!("Unrepresentable expiration date {}", date)))
}
