use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::Error;
use crate::gate::Gate;
use crate::providers::traits::MarketDataProvider;
use crate::types::{Contract, OptionSnapshot};

/// Fetch snapshots for every contract concurrently, each call under the
/// fetch gate and its own timeout.
///
/// Only found snapshots are returned, each paired with its contract. A
/// missing market, a transport error or a timeout all count as "no snapshot
/// this round"; failures are logged.
pub async fn fetch_snapshots_batch<P>(
    provider: &P,
    contracts: Vec<Contract>,
    gate: &Gate,
    timeout: Duration,
) -> Vec<(Contract, OptionSnapshot)>
where
    P: MarketDataProvider + ?Sized,
{
    let fetches = contracts.into_iter().map(|contract| async move {
        let fetched = gate
            .run(async {
                tokio::time::timeout(
                    timeout,
                    provider.fetch_snapshot(&contract.underlying, &contract.ticker),
                )
                .await
                .map_err(|_| Error::Timeout(format!("snapshot for {} after {:?}", contract.ticker, timeout)))?
            })
            .await;

        match fetched {
            Ok(Some(snapshot)) => Some((contract, snapshot)),
            Ok(None) => {
                debug!("{} has no market", contract.ticker);
                None
            }
            Err(e) => {
                warn!("Failed to fetch snapshot for {}: {}", contract.ticker, e);
                None
            }
        }
    });

    join_all(fetches).await.into_iter().flatten().collect()
}
