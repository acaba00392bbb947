use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use tracing::{debug, debug_span, error, Instrument};

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::db::ContractStore;
use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::types::Contract;

/// Pages through active contracts relative to one ingest session.
#[derive(Debug, Clone)]
pub struct ContractRetriever {
    page_size: u64,
    ingest_time: Option<DateTime<Utc>>,
}

impl Default for ContractRetriever {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ContractRetriever {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            ingest_time: None,
        }
    }

    pub fn with_ingest_time(mut self, ingest_time: DateTime<Utc>) -> Self {
        self.ingest_time = Some(ingest_time);
        self
    }

    pub fn ingest_time(&self) -> Result<DateTime<Utc>> {
        self.ingest_time.ok_or(Error::UnboundSession)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Lazy sequence of pages of contracts expiring at or after the session
    /// time. Each query is offset by the number of contracts already
    /// yielded; the stream ends on the first empty page. A store error is
    /// logged and ends the stream early.
    pub fn stream_active<'a, S>(&self, store: &'a S, gate: &'a Gate) -> Result<BoxStream<'a, Vec<Contract>>>
    where
        S: ContractStore + ?Sized,
    {
        let active_since = self.ingest_time()?;
        let page_size = self.page_size;

        let pages = stream::unfold(0u64, move |offset| async move {
            let page = gate
                .run(store.find_active_contracts(active_since, offset, page_size))
                .instrument(debug_span!("contracts_page", offset, page_size))
                .await;

            match page {
                Ok(contracts) if contracts.is_empty() => {
                    debug!("No more active contracts after {}", offset);
                    None
                }
                Ok(contracts) => {
                    let next = offset + contracts.len() as u64;
                    Some((contracts, next))
                }
                Err(e) => {
                    error!("Failed to read contracts at offset {}: {}", offset, e);
                    None
                }
            }
        });

        Ok(pages.boxed())
    }

    /// Whole contract table, or an empty list when the store fails.
    pub async fn retrieve_all<S>(&self, store: &S) -> Vec<Contract>
    where
        S: ContractStore + ?Sized,
    {
        match store.find_all_contracts().await {
            Ok(contracts) => contracts,
            Err(e) => {
                error!("Failed to retrieve contracts: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::types::{ContractType, SnapshotRecord};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn session_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 14, 0, 0).unwrap()
    }

    fn contract(i: usize, expired: bool) -> Contract {
        let day = if expired { 1 } else { 15 };
        let month = if expired { 7 } else { 9 };
        Contract {
            ticker: format!("O:HOOD2509{:02}C{:08}", day, i * 1000),
            underlying: "HOOD".into(),
            strike: i as f64,
            expiration: Utc.with_ymd_and_hms(2025, month, day, 4, 0, 0).unwrap(),
            contract_type: ContractType::Call,
        }
    }

    async fn seeded_store(active: usize, expired: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..active {
            store.upsert_contract(&contract(i, false)).await.unwrap();
        }
        for i in 0..expired {
            store.upsert_contract(&contract(100 + i, true)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_pages_active_contracts() {
        let store = seeded_store(7, 2).await;
        let gate = Gate::new("persist", 2);
        let retriever = ContractRetriever::new(3).with_ingest_time(session_time());

        let pages: Vec<Vec<Contract>> = retriever.stream_active(&store, &gate).unwrap().collect().await;
        let sizes: Vec<usize> = pages.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let mut tickers: Vec<&str> = pages.iter().flatten().map(|c| c.ticker.as_str()).collect();
        tickers.dedup();
        assert_eq!(tickers.len(), 7);
    }

    #[tokio::test]
    async fn test_unbound_session_is_rejected() {
        let store = MemoryStore::new();
        let gate = Gate::new("persist", 1);
        let retriever = ContractRetriever::new(3);

        assert!(matches!(retriever.ingest_time(), Err(Error::UnboundSession)));
        assert!(matches!(
            retriever.stream_active(&store, &gate).map(|_| ()),
            Err(Error::UnboundSession)
        ));
    }

    struct BrokenAfterFirstPage {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ContractStore for BrokenAfterFirstPage {
        async fn upsert_contract(&self, contract: &Contract) -> Result<()> {
            self.inner.upsert_contract(contract).await
        }

        async fn find_active_contracts(&self, since: DateTime<Utc>, offset: u64, limit: u64) -> Result<Vec<Contract>> {
            if offset > 0 {
                return Err(Error::Database("connection reset".into()));
            }
            self.inner.find_active_contracts(since, offset, limit).await
        }

        async fn find_all_contracts(&self) -> Result<Vec<Contract>> {
            Err(Error::Database("connection reset".into()))
        }

        async fn upsert_snapshot(&self, snapshot: &SnapshotRecord) -> Result<()> {
            self.inner.upsert_snapshot(snapshot).await
        }
    }

    #[tokio::test]
    async fn test_store_error_truncates_stream() {
        let store = BrokenAfterFirstPage {
            inner: seeded_store(7, 0).await,
        };
        let gate = Gate::new("persist", 1);
        let retriever = ContractRetriever::new(3).with_ingest_time(session_time());

        let pages: Vec<Vec<Contract>> = retriever.stream_active(&store, &gate).unwrap().collect().await;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_all() {
        let retriever = ContractRetriever::default();
        let store = seeded_store(2, 1).await;
        assert_eq!(retriever.retrieve_all(&store).await.len(), 3);

        let broken = BrokenAfterFirstPage { inner: store };
        assert!(retriever.retrieve_all(&broken).await.is_empty());
    }
}
