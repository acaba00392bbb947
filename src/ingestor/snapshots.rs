use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::StreamExt;
use tracing::{debug, debug_span, error, info, info_span, warn, Instrument};

use crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::db::{Connector, ContractStore};
use crate::error::{Error, Result};
use crate::gate::{Gates, SessionConnection};
use crate::ingestor::{SnapshotFailurePolicy, SnapshotReport};
use crate::providers::{fetch_snapshots_batch, MarketDataProvider};
use crate::retriever::ContractRetriever;
use crate::retry::RetryPolicy;
use crate::types::{IngestSession, OptionSnapshot, SnapshotRecord};

#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    /// Per provider call
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub failure_policy: SnapshotFailurePolicy,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            failure_policy: SnapshotFailurePolicy::default(),
        }
    }
}

/// Result of writing one (contract, snapshot) pair.
#[derive(Debug)]
pub enum WriteOutcome {
    Written,
    /// A row at this (ticker, last_updated) already exists
    Duplicate,
    /// The provider has never reported a trade time
    NeverActive,
    Failed(Error),
}

/// Refreshes snapshots of every active contract, one store page at a time.
pub struct SnapshotIngestor<P: ?Sized, C: Connector> {
    provider: Arc<P>,
    connection: SessionConnection<C>,
    gates: Gates,
    retriever: ContractRetriever,
    settings: SnapshotSettings,
    session: IngestSession,
}

impl<P, C> SnapshotIngestor<P, C>
where
    P: MarketDataProvider + ?Sized,
    C: Connector,
{
    pub fn new(
        provider: Arc<P>,
        connection: SessionConnection<C>,
        gates: Gates,
        retriever: ContractRetriever,
        settings: SnapshotSettings,
    ) -> Self {
        let session = IngestSession::now();
        Self {
            provider,
            connection,
            gates,
            retriever: retriever.with_ingest_time(session.started_at),
            settings,
            session,
        }
    }

    pub fn with_session(mut self, session: IngestSession) -> Self {
        self.retriever = self.retriever.with_ingest_time(session.started_at);
        self.session = session;
        self
    }

    pub fn session(&self) -> IngestSession {
        self.session
    }

    pub async fn ingest_snapshots(&self) -> Result<SnapshotReport> {
        let guard = self.connection.acquire().await?;

        let result = self
            .run(&*guard)
            .instrument(info_span!("ingest_snapshots", session = %self.session.started_at))
            .await;

        let released = guard.release().await;
        let report = result?;
        released?;
        Ok(report)
    }

    async fn run(&self, store: &C::Store) -> Result<SnapshotReport> {
        let mut report = SnapshotReport::default();
        let mut pages = self.retriever.stream_active(store, &self.gates.persist)?;

        while let Some(page) = pages.next().await {
            report.pages += 1;
            report.contracts += page.len();
            info!("Processing batch of {} contracts...", page.len());

            let found = fetch_snapshots_batch(
                self.provider.as_ref(),
                page,
                &self.gates.fetch,
                self.settings.request_timeout,
            )
            .await;
            report.fetched += found.len();

            let outcomes = join_all(
                found
                    .iter()
                    .map(|(contract, snapshot)| self.write_snapshot(store, &contract.ticker, snapshot)),
            )
            .await;

            let mut first_failure = None;
            for outcome in outcomes {
                report.record(&outcome);
                if let WriteOutcome::Failed(e) = outcome {
                    first_failure.get_or_insert(e);
                }
            }

            info!(
                "Page {} done: {} contracts processed so far ({} written, {} failed)",
                report.pages, report.contracts, report.written, report.failed
            );

            if let (SnapshotFailurePolicy::Propagate, Some(e)) = (self.settings.failure_policy, first_failure) {
                error!("Stopping snapshot run after page {}: {}", report.pages, e);
                return Err(e);
            }
        }

        info!(
            "✅ All option snapshots processed. Total contracts processed: {} ({})",
            report.contracts, report
        );
        Ok(report)
    }

    async fn write_snapshot(&self, store: &C::Store, ticker: &str, snapshot: &OptionSnapshot) -> WriteOutcome {
        let record = match SnapshotRecord::from_snapshot(ticker, snapshot, self.session.started_at) {
            Ok(record) => record,
            Err(e) => {
                info!("{}", e);
                return WriteOutcome::NeverActive;
            }
        };

        let retry = self.settings.retry;
        let written = {
            let record = &record;
            retry
                .retry_async(
                    |attempt| async move {
                        self.gates
                            .persist
                            .run(store.upsert_snapshot(record))
                            .await
                            .map_err(|e| {
                                if e.is_retryable() {
                                    warn!(
                                        "Error inserting snapshot for {}: {} (attempt {}/{})",
                                        ticker, e, attempt, retry.max_attempts
                                    );
                                }
                                e
                            })
                    },
                    Error::is_retryable,
                )
                .instrument(debug_span!("upsert_snapshot", ticker))
                .await
        };

        match written {
            Ok(()) => {
                info!(
                    "{} Inserted snapshot for {}: OI={:?}",
                    self.session.started_at, ticker, record.open_interest
                );
                debug!("{}", record.summary());
                WriteOutcome::Written
            }
            Err(Error::DuplicateWrite(_)) => {
                info!("{} at {} has no new update on snapshot", ticker, record.last_updated);
                WriteOutcome::Duplicate
            }
            Err(e @ Error::Connectivity(_)) => {
                error!("Database connection error while writing {}: {}", ticker, e);
                WriteOutcome::Failed(e)
            }
            Err(e) => {
                error!("Failed to insert snapshot for {}: {}", ticker, e);
                WriteOutcome::Failed(e)
            }
        }
    }
}
