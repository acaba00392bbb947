use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{Contract, ContractType, OptionSnapshot};
use crate::utils::time::expiration_to_datetime;

/// A contract as listed by the provider's reference endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedContract {
    pub ticker: String,
    pub underlying_ticker: String,
    pub contract_type: ContractType,
    pub strike_price: f64,
    pub expiration_date: NaiveDate,
}

impl TryFrom<ListedContract> for Contract {
    type Error = crate::error::Error;

    fn try_from(listed: ListedContract) -> Result<Self> {
        Ok(Contract {
            expiration: expiration_to_datetime(listed.expiration_date)?,
            ticker: listed.ticker,
            underlying: listed.underlying_ticker,
            strike: listed.strike_price,
            contract_type: listed.contract_type,
        })
    }
}

/// Upstream market-data source.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// List contracts on `underlying` of one type. Ordering is unspecified.
    async fn list_contracts(
        &self,
        underlying: &str,
        contract_type: ContractType,
        unexpired_only: bool,
    ) -> Result<Vec<ListedContract>>;

    /// Current snapshot of one contract. `Ok(None)` when the provider has no
    /// market for it.
    async fn fetch_snapshot(&self, underlying: &str, ticker: &str) -> Result<Option<OptionSnapshot>>;
}
