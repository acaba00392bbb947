use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug_span, error, info, info_span, warn, Instrument};

use crate::db::{Connector, ContractStore};
use crate::error::Result;
use crate::filter::within_range;
use crate::gate::{Gates, SessionConnection};
use crate::ingestor::{DiscoveryFailurePolicy, DiscoveryReport};
use crate::providers::MarketDataProvider;
use crate::types::{Contract, ContractType, IngestParams, IngestSession};

struct AssetTally {
    listed: usize,
    matched: usize,
    stored: usize,
}

/// Lists contracts per underlying, narrows them and upserts the survivors.
pub struct ContractIngestor<P: ?Sized, C: Connector> {
    provider: Arc<P>,
    connection: SessionConnection<C>,
    gates: Gates,
    policy: DiscoveryFailurePolicy,
    session: IngestSession,
}

impl<P, C> ContractIngestor<P, C>
where
    P: MarketDataProvider + ?Sized,
    C: Connector,
{
    pub fn new(
        provider: Arc<P>,
        connection: SessionConnection<C>,
        gates: Gates,
        policy: DiscoveryFailurePolicy,
    ) -> Self {
        Self {
            provider,
            connection,
            gates,
            policy,
            session: IngestSession::now(),
        }
    }

    pub fn with_session(mut self, session: IngestSession) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> IngestSession {
        self.session
    }

    pub async fn ingest_discovery(&self, targets: &[IngestParams]) -> Result<DiscoveryReport> {
        let guard = self.connection.acquire().await?;

        let result = self
            .discover_all(&*guard, targets)
            .instrument(info_span!("ingest_discovery", targets = targets.len()))
            .await;

        let released = guard.release().await;
        let report = result?;
        released?;
        Ok(report)
    }

    async fn discover_all(&self, store: &C::Store, targets: &[IngestParams]) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        for target in targets {
            report.assets += 1;
            let asset = target.underlying_asset.as_str();

            match self
                .discover_asset(store, target)
                .instrument(info_span!("discover_asset", underlying = asset))
                .await
            {
                Ok(tally) => {
                    report.listed += tally.listed;
                    report.matched += tally.matched;
                    report.stored += tally.stored;
                }
                Err(e) => match self.policy {
                    DiscoveryFailurePolicy::Abort => {
                        error!("Discovery for {} failed: {}", asset, e);
                        return Err(e);
                    }
                    DiscoveryFailurePolicy::ContinueWithNextAsset => {
                        error!("Discovery for {} failed, moving on: {}", asset, e);
                        report.failed_assets.push(asset.to_string());
                    }
                },
            }
        }

        info!("✅ Discovery finished: {}", report);
        Ok(report)
    }

    async fn discover_asset(&self, store: &C::Store, target: &IngestParams) -> Result<AssetTally> {
        let asset = target.underlying_asset.as_str();

        let mut listed = Vec::new();
        for contract_type in [ContractType::Call, ContractType::Put] {
            let contracts = self
                .gates
                .fetch
                .run(self.provider.list_contracts(asset, contract_type, true))
                .await?;
            listed.extend(contracts);
        }

        info!("Total contracts found for {}: {}", asset, listed.len());
        if listed.is_empty() {
            warn!("No unexpired contracts found for {}", asset);
            return Ok(AssetTally {
                listed: 0,
                matched: 0,
                stored: 0,
            });
        }
        let listed_count = listed.len();

        let contracts = listed
            .into_iter()
            .map(Contract::try_from)
            .collect::<Result<Vec<_>>>()?;
        let contracts = within_range(contracts, target.price_range, target.year_range)?;
        let matched = contracts.len();

        let results = join_all(contracts.iter().map(|c| self.upsert_contract(store, c))).await;
        let stored = results.iter().filter(|r| r.is_ok()).count();
        if let Some(e) = results.into_iter().find_map(Result::err) {
            return Err(e);
        }

        info!("All {} contracts for {} processed successfully", stored, asset);
        Ok(AssetTally {
            listed: listed_count,
            matched,
            stored,
        })
    }

    async fn upsert_contract(&self, store: &C::Store, contract: &Contract) -> Result<()> {
        info!(
            "Upserting contract: {}, Strike: {}, Expiration: {}, Type: {}",
            contract.ticker, contract.strike, contract.expiration, contract.contract_type
        );

        self.gates
            .persist
            .run(store.upsert_contract(contract))
            .instrument(debug_span!("upsert_contract", ticker = contract.ticker.as_str()))
            .await
            .map_err(|e| {
                error!("Error upserting contract {}: {}", contract.ticker, e);
                e
            })
    }
}
