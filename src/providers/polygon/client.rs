//! Polygon REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::models::*;
use crate::config::PolygonConfig;
use crate::constants::CONTRACTS_PAGE_LIMIT;
use crate::error::{Error, Result};
use crate::providers::traits::{ListedContract, MarketDataProvider};
use crate::types::{ContractType, OptionSnapshot};

/// Polygon client for option reference data and snapshots
pub struct PolygonClient {
    http: HttpClient,
    base_url: Url,
    api_key: String,
}

impl PolygonClient {
    /// Create a new Polygon client. Every request carries the configured timeout.
    pub fn new(config: &PolygonConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: Url::parse(&config.base_url)?,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid Polygon base URL: {}", self.base_url)))?
            .clear()
            .extend(segments);
        url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        Ok(url)
    }

    fn contracts_url(
        &self,
        underlying: &str,
        contract_type: ContractType,
        unexpired_only: bool,
    ) -> Result<Url> {
        let mut url = self.endpoint(&["v3", "reference", "options", "contracts"])?;
        url.query_pairs_mut()
            .append_pair("underlying_ticker", underlying)
            .append_pair("contract_type", contract_type.provider_str())
            .append_pair("expired", if unexpired_only { "false" } else { "true" })
            .append_pair("order", "desc")
            .append_pair("sort", "strike_price")
            .append_pair("limit", &CONTRACTS_PAGE_LIMIT.to_string());
        Ok(url)
    }

    fn snapshot_url(&self, underlying: &str, ticker: &str) -> Result<Url> {
        self.endpoint(&["v3", "snapshot", "options", underlying, ticker])
    }

    /// `next_url` comes back without credentials and may be relative.
    fn normalize_next_url(&self, next_url: &str) -> Result<Url> {
        let mut url = match Url::parse(next_url) {
            Ok(abs) => abs,
            Err(_) => self.base_url.join(next_url)?,
        };
        if !url.query_pairs().any(|(k, _)| k == "apiKey") {
            url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        }
        Ok(url)
    }

    /// GET and decode JSON. A 404 is `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let path = url.path().to_string();
        let resp = self.http.get(url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("HTTP {} on {}: {}", status, path, body)));
        }

        let data = resp.json::<T>().await?;
        Ok(Some(data))
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn list_contracts(
        &self,
        underlying: &str,
        contract_type: ContractType,
        unexpired_only: bool,
    ) -> Result<Vec<ListedContract>> {
        let mut contracts = Vec::new();
        let mut next = Some(self.contracts_url(underlying, contract_type, unexpired_only)?);

        while let Some(url) = next {
            let Some(page) = self.get_json::<ContractsResponse>(url).await? else {
                break;
            };

            for contract in page.results {
                contracts.push(ListedContract::try_from(contract)?);
            }

            next = match page.next_url.filter(|u| !u.is_empty()) {
                Some(u) => Some(self.normalize_next_url(&u)?),
                None => None,
            };
        }

        info!(
            "Listed {} {} contracts for {}",
            contracts.len(),
            contract_type.provider_str(),
            underlying
        );
        Ok(contracts)
    }

    async fn fetch_snapshot(&self, underlying: &str, ticker: &str) -> Result<Option<OptionSnapshot>> {
        let url = self.snapshot_url(underlying, ticker)?;

        match self.get_json::<SnapshotResponse>(url).await? {
            Some(SnapshotResponse { results: Some(snapshot), .. }) => Ok(Some(snapshot.into())),
            _ => {
                debug!("No snapshot available for {}", ticker);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PolygonClient {
        PolygonClient::new(&PolygonConfig {
            api_key: "test-key".into(),
            base_url: "https://api.polygon.io".into(),
            request_timeout_secs: 10,
        })
        .unwrap()
    }

    #[test]
    fn test_contracts_url() {
        let url = client().contracts_url("NBIS", ContractType::Put, true).unwrap();
        assert_eq!(url.path(), "/v3/reference/options/contracts");

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("apiKey".into(), "test-key".into())));
        assert!(query.contains(&("underlying_ticker".into(), "NBIS".into())));
        assert!(query.contains(&("contract_type".into(), "put".into())));
        assert!(query.contains(&("expired".into(), "false".into())));
    }

    #[test]
    fn test_snapshot_url_keeps_ticker_segment() {
        let url = client().snapshot_url("SE", "O:SE250808C00165000").unwrap();
        assert_eq!(url.path(), "/v3/snapshot/options/SE/O:SE250808C00165000");
    }

    #[test]
    fn test_next_url_gets_api_key() {
        let c = client();
        let url = c
            .normalize_next_url("https://api.polygon.io/v3/reference/options/contracts?cursor=abc")
            .unwrap();
        assert_eq!(url.query_pairs().filter(|(k, _)| k == "apiKey").count(), 1);

        let relative = c.normalize_next_url("/v3/reference/options/contracts?cursor=abc&apiKey=x").unwrap();
        assert_eq!(relative.host_str(), Some("api.polygon.io"));
        assert_eq!(relative.query_pairs().filter(|(k, _)| k == "apiKey").count(), 1);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = PolygonClient::new(&PolygonConfig {
            api_key: "k".into(),
            base_url: "not a url".into(),
            request_timeout_secs: 10,
        });
        assert!(matches!(result, Err(Error::UrlParse(_))));
    }
}
