use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::traits::ListedContract;
use crate::types::{Greeks, OptionSnapshot};
use crate::utils::time::{ns_to_datetime, parse_expiration_date};

#[derive(Debug, Deserialize)]
pub struct ContractsResponse {
    #[serde(default)]
    pub results: Vec<PolygonContract>,
    pub next_url: Option<String>,
    pub status: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolygonContract {
    pub ticker: String,
    pub underlying_ticker: String,
    pub contract_type: String,
    #[serde(default)]
    pub strike_price: Option<f64>,
    pub expiration_date: String,
    #[serde(default)]
    pub exercise_style: Option<String>,
    #[serde(default)]
    pub shares_per_contract: Option<f64>,
    #[serde(default)]
    pub primary_exchange: Option<String>,
}

impl TryFrom<PolygonContract> for ListedContract {
    type Error = Error;

    fn try_from(contract: PolygonContract) -> Result<Self> {
        Ok(ListedContract {
            contract_type: contract.contract_type.parse()?,
            expiration_date: parse_expiration_date(&contract.expiration_date)?,
            strike_price: contract.strike_price.unwrap_or(0.0),
            ticker: contract.ticker,
            underlying_ticker: contract.underlying_ticker,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapshotResponse {
    pub results: Option<PolygonSnapshot>,
    pub status: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolygonSnapshot {
    #[serde(default)]
    pub day: Option<DayBar>,
    #[serde(default)]
    pub greeks: Option<Greeks>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub break_even_price: Option<f64>,
    #[serde(default)]
    pub details: Option<SnapshotDetails>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DayBar {
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub vwap: Option<f64>,
    pub previous_close: Option<f64>,
    /// Nanoseconds since epoch
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotDetails {
    pub ticker: Option<String>,
    pub contract_type: Option<String>,
    pub expiration_date: Option<String>,
    pub strike_price: Option<f64>,
}

impl From<PolygonSnapshot> for OptionSnapshot {
    fn from(snapshot: PolygonSnapshot) -> Self {
        let day = snapshot.day.unwrap_or_default();
        OptionSnapshot {
            open_interest: snapshot.open_interest,
            implied_volatility: snapshot.implied_volatility,
            greeks: snapshot.greeks,
            day_open: day.open,
            day_close: day.close,
            day_change_percent: day.change_percent,
            day_volume: day.volume,
            // zero means the provider has never seen a trade
            last_updated: day.last_updated.filter(|ns| *ns > 0).and_then(ns_to_datetime),
        }
    }
}
