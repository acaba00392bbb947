use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::db::{Connector, ContractStore, MemoryConnector, MemoryStore, SeaOrmConnector};
use crate::error::{Error, Result};
use crate::gate::{Gates, SessionConnection};
use crate::ingestor::{ContractIngestor, SnapshotIngestor, SnapshotSettings};
use crate::providers::{MarketDataProvider, PolygonClient};
use crate::retriever::ContractRetriever;
use crate::retry::RetryPolicy;

/// `DATABASE_URL` prefix selecting the in-process store.
const MEMORY_URL_PREFIX: &str = "memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Discover contracts for the configured targets
    Contracts,
    /// Refresh snapshots of every active contract
    Snapshots,
    /// Create the tables
    Schema,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contracts" | "discover" => Ok(Command::Contracts),
            "snapshots" => Ok(Command::Snapshots),
            "schema" => Ok(Command::Schema),
            other => Err(Error::Config(format!(
                "Unknown command '{}', expected contracts, snapshots or schema",
                other
            ))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Contracts => "contracts",
            Command::Snapshots => "snapshots",
            Command::Schema => "schema",
        };
        f.write_str(name)
    }
}

pub async fn run(config: Config, command: Command) -> Result<()> {
    info!("📈 options-harvest: {}", command);
    info!("================================");

    let provider = Arc::new(PolygonClient::new(&config.polygon)?);

    if config.database.url.starts_with(MEMORY_URL_PREFIX) {
        info!("Using in-memory store; nothing is persisted");
        let connector = MemoryConnector::new(MemoryStore::new());
        execute(&config, command, provider, connector).await
    } else {
        let connector = SeaOrmConnector::new(config.database.clone());
        execute(&config, command, provider, connector).await
    }
}

/// Run one command against an already chosen provider and store.
pub async fn execute<P, C>(config: &Config, command: Command, provider: Arc<P>, connector: C) -> Result<()>
where
    P: MarketDataProvider + ?Sized,
    C: Connector,
{
    let connection = SessionConnection::new(connector);
    let gates = Gates::new(config.ingest.fetch_concurrency, config.ingest.db_concurrency);

    match command {
        Command::Schema => {
            let guard = connection.acquire().await?;
            let created = guard.ensure_schema().await;
            guard.release().await?;
            created
        }
        Command::Contracts => {
            if config.ingest.targets.is_empty() {
                return Err(Error::Config("INGEST_TARGETS is empty".into()));
            }
            info!("Targets: {:?}", config.ingest.targets);

            let ingestor = ContractIngestor::new(
                provider,
                connection,
                gates,
                config.ingest.discovery_failure_policy,
            );
            let report = ingestor.ingest_discovery(&config.ingest.targets).await?;
            info!("Discovery report: {}", report);
            Ok(())
        }
        Command::Snapshots => {
            let settings = SnapshotSettings {
                request_timeout: std::time::Duration::from_secs(config.polygon.request_timeout_secs),
                retry: RetryPolicy::new(
                    config.ingest.snapshot_max_attempts,
                    config.ingest.snapshot_retry_delay,
                ),
                failure_policy: config.ingest.snapshot_failure_policy,
            };

            let ingestor = SnapshotIngestor::new(
                provider,
                connection,
                gates,
                ContractRetriever::new(config.ingest.page_size),
                settings,
            );
            let report = ingestor.ingest_snapshots().await?;
            info!("Snapshot report: {}", report);
            Ok(())
        }
    }
}
