use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::db::traits::{Connector, ContractStore};
use crate::error::{Error, Result};
use crate::types::{Contract, SnapshotRecord};

type SnapshotKey = (String, DateTime<Utc>);

/// In-process store with the same keying rules as the relational one.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contracts: Arc<DashMap<String, Contract>>,
    snapshots: Arc<DashMap<SnapshotKey, SnapshotRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract(&self, ticker: &str) -> Option<Contract> {
        self.contracts.get(ticker).map(|c| c.value().clone())
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Snapshots of one ticker ordered by `last_updated`.
    pub fn snapshots_for(&self, ticker: &str) -> Vec<SnapshotRecord> {
        let mut found: Vec<SnapshotRecord> = self
            .snapshots
            .iter()
            .filter(|entry| entry.key().0 == ticker)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|s| s.last_updated);
        found
    }

    pub fn all_snapshots(&self) -> Vec<SnapshotRecord> {
        let mut found: Vec<SnapshotRecord> = self.snapshots.iter().map(|e| e.value().clone()).collect();
        found.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.last_updated.cmp(&b.last_updated)));
        found
    }

    fn sorted_contracts(&self) -> Vec<Contract> {
        let mut contracts: Vec<Contract> = self.contracts.iter().map(|e| e.value().clone()).collect();
        contracts.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        contracts
    }
}

#[async_trait]
impl ContractStore for MemoryStore {
    async fn upsert_contract(&self, contract: &Contract) -> Result<()> {
        self.contracts.insert(contract.ticker.clone(), contract.clone());
        Ok(())
    }

    async fn find_active_contracts(
        &self,
        active_since: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Contract>> {
        Ok(self
            .sorted_contracts()
            .into_iter()
            .filter(|c| c.expiration >= active_since)
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn find_all_contracts(&self) -> Result<Vec<Contract>> {
        Ok(self.sorted_contracts())
    }

    async fn upsert_snapshot(&self, record: &SnapshotRecord) -> Result<()> {
        match self.snapshots.entry((record.ticker.clone(), record.last_updated)) {
            Entry::Occupied(_) => Err(Error::DuplicateWrite(format!(
                "{} @ {}",
                record.ticker, record.last_updated
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }
}

/// Hands out a shared [`MemoryStore`] and counts connects and disconnects.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
    connect_delay: Option<Duration>,
    failures_left: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// The next `n` connects fail with `Error::Connectivity`.
    pub fn with_failed_connects(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Connectivity("memory store unavailable".into()));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }

    async fn disconnect(&self, _store: Arc<MemoryStore>) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
