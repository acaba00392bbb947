use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractType {
    Call,
    Put,
}

impl ContractType {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Call => "CALL",
            ContractType::Put => "PUT",
        }
    }

    /// Value of the provider's `contract_type` query parameter
    pub fn provider_str(&self) -> &'static str {
        match self {
            ContractType::Call => "call",
            ContractType::Put => "put",
        }
    }

    /// Letter used inside an option symbol
    pub fn code(&self) -> char {
        match self {
            ContractType::Call => 'C',
            ContractType::Put => 'P',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'C' => Some(ContractType::Call),
            'P' => Some(ContractType::Put),
            _ => None,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(ContractType::Call),
            "put" | "p" => Ok(ContractType::Put),
            _ => Err(Error::Format(format!("Unknown contract type: {}", s))),
        }
    }
}

/// A persisted option contract. Keyed by `ticker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub ticker: String,
    pub underlying: String,
    pub strike: f64,
    pub expiration: DateTime<Utc>,
    pub contract_type: ContractType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
}

/// Market snapshot as reported by the provider for one contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSnapshot {
    pub open_interest: Option<f64>,
    pub implied_volatility: Option<f64>,
    pub greeks: Option<Greeks>,
    pub day_open: Option<f64>,
    pub day_close: Option<f64>,
    pub day_change_percent: Option<f64>,
    pub day_volume: Option<f64>,
    /// Provider event time; absent when the contract has never traded
    pub last_updated: Option<DateTime<Utc>>,
}

/// Snapshot row. Unique per (`ticker`, `last_updated`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub ticker: String,
    pub open_interest: Option<i64>,
    pub volume: Option<f64>,
    pub implied_volatility: Option<f64>,
    pub greeks: Option<Greeks>,
    pub last_price: Option<f64>,
    pub day_open: Option<f64>,
    pub day_close: Option<f64>,
    pub day_change_percent: Option<f64>,
    pub last_updated: DateTime<Utc>,
    pub last_crawled: DateTime<Utc>,
}

impl SnapshotRecord {
    pub fn from_snapshot(
        ticker: &str,
        snapshot: &OptionSnapshot,
        last_crawled: DateTime<Utc>,
    ) -> Result<Self> {
        let last_updated = snapshot
            .last_updated
            .ok_or_else(|| Error::NeverActive(ticker.to_string()))?;

        Ok(Self {
            ticker: ticker.to_string(),
            open_interest: snapshot.open_interest.map(|oi| oi as i64),
            volume: snapshot.day_volume,
            implied_volatility: snapshot.implied_volatility,
            greeks: snapshot.greeks,
            last_price: snapshot.day_close,
            day_open: snapshot.day_open,
            day_close: snapshot.day_close,
            day_change_percent: snapshot.day_change_percent,
            last_updated,
            last_crawled,
        })
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let fmt_price = |v: Option<f64>| v.map(|p| format!("${:.2}", p)).unwrap_or_else(|| "N/A".into());
        format!(
            "Ticker: {} | OI: {} | Day Volume: {} | IV: {} | DayOpen: {} | DayClose: {} | Day Price Change: {} | Last Updated: {}",
            self.ticker,
            self.open_interest.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into()),
            self.volume.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into()),
            self.implied_volatility
                .map(|iv| format!("{:.2}%", iv * 100.0))
                .unwrap_or_else(|| "N/A".into()),
            fmt_price(self.day_open),
            fmt_price(self.day_close),
            self.day_change_percent
                .map(|c| format!("{:.2}%", c))
                .unwrap_or_else(|| "N/A".into()),
            self.last_updated,
        )
    }
}

/// Inclusive expiration-year window; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl YearRange {
    pub fn new(start: Option<i32>, end: Option<i32>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start.map_or(true, |s| year >= s) && self.end.map_or(true, |e| year <= e)
    }
}

/// Inclusive strike window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, strike: f64) -> bool {
        strike >= self.min && strike <= self.max
    }
}

/// Discovery scope for one underlying. Not persisted.
///
/// Parses from `UNDERLYING[:MIN-MAX[:START-END]]`, where every bound may be
/// left empty, e.g. `NBIS:40-70:2025-2025`, `MU::2025-2026` or `SNOW::2025-`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestParams {
    pub underlying_asset: String,
    pub price_range: Option<PriceRange>,
    pub year_range: Option<YearRange>,
}

impl IngestParams {
    pub fn new(underlying_asset: impl Into<String>) -> Self {
        Self {
            underlying_asset: underlying_asset.into(),
            price_range: None,
            year_range: None,
        }
    }

    pub fn with_price_range(mut self, min: f64, max: f64) -> Self {
        self.price_range = Some(PriceRange::new(min, max));
        self
    }

    pub fn with_year_range(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.year_range = Some(YearRange::new(start, end));
        self
    }
}

fn split_bounds(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('-')
        .map(|(lo, hi)| (lo.trim(), hi.trim()))
        .ok_or_else(|| Error::Config(format!("Expected MIN-MAX range, got '{}'", raw)))
}

impl FromStr for IngestParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let underlying = parts
            .next()
            .map(|u| u.trim().to_uppercase())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config(format!("Missing underlying in target '{}'", s)))?;

        let mut params = IngestParams::new(underlying);

        if let Some(price) = parts.next().map(str::trim).filter(|p| !p.is_empty()) {
            let (lo, hi) = split_bounds(price)?;
            let parse = |v: &str| {
                v.parse::<f64>()
                    .map_err(|e| Error::Config(format!("Invalid price bound '{}': {}", v, e)))
            };
            params = params.with_price_range(parse(lo)?, parse(hi)?);
        }

        if let Some(years) = parts.next().map(str::trim).filter(|y| !y.is_empty()) {
            let (lo, hi) = split_bounds(years)?;
            let parse = |v: &str| -> Result<Option<i32>> {
                if v.is_empty() {
                    return Ok(None);
                }
                v.parse::<i32>()
                    .map(Some)
                    .map_err(|e| Error::Config(format!("Invalid year bound '{}': {}", v, e)))
            };
            params = params.with_year_range(parse(lo)?, parse(hi)?);
        }

        if parts.next().is_some() {
            return Err(Error::Config(format!("Too many fields in target '{}'", s)));
        }

        Ok(params)
    }
}

/// Reference time of one ingest run, captured once at ingestor construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSession {
    pub started_at: DateTime<Utc>,
}

impl IngestSession {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }
}
