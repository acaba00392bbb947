#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use options_harvest::db::{Connector, ContractStore, MemoryStore};
use options_harvest::error::{Error, Result};
use options_harvest::providers::{ListedContract, MarketDataProvider};
use options_harvest::symbol::OptionSymbol;
use options_harvest::types::{Contract, ContractType, IngestSession, OptionSnapshot, SnapshotRecord};

// ── Clock ────────────────────────────────────────────────────────────

pub fn session_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 14, 0, 0).unwrap()
}

pub fn session() -> IngestSession {
    IngestSession::at(session_time())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ── Contracts ────────────────────────────────────────────────────────

pub fn ticker(underlying: &str, expiration: NaiveDate, contract_type: ContractType, strike: f64) -> String {
    let strike = Decimal::from_f64_retain(strike).unwrap().round_dp(3);
    OptionSymbol::new(underlying, expiration, contract_type, strike)
        .ticker()
        .unwrap()
}

pub fn listed(underlying: &str, expiration: NaiveDate, contract_type: ContractType, strike: f64) -> ListedContract {
    ListedContract {
        ticker: ticker(underlying, expiration, contract_type, strike),
        underlying_ticker: underlying.to_string(),
        contract_type,
        strike_price: strike,
        expiration_date: expiration,
    }
}

pub fn contract(underlying: &str, expiration: NaiveDate, contract_type: ContractType, strike: f64) -> Contract {
    Contract::try_from(listed(underlying, expiration, contract_type, strike)).unwrap()
}

/// `n` calls on `underlying` expiring 2025-09-19, strikes 10, 20, ...
pub fn active_contracts(underlying: &str, n: usize) -> Vec<Contract> {
    (1..=n)
        .map(|i| contract(underlying, date(2025, 9, 19), ContractType::Call, (i * 10) as f64))
        .collect()
}

pub async fn seed<S: ContractStore + ?Sized>(store: &S, contracts: &[Contract]) {
    for c in contracts {
        store.upsert_contract(c).await.unwrap();
    }
}

pub fn traded_snapshot(open_interest: f64) -> OptionSnapshot {
    OptionSnapshot {
        open_interest: Some(open_interest),
        implied_volatility: Some(0.55),
        day_open: Some(2.0),
        day_close: Some(2.5),
        day_change_percent: Some(25.0),
        day_volume: Some(40.0),
        last_updated: Some(Utc.with_ymd_and_hms(2025, 8, 1, 13, 59, 0).unwrap()),
        ..Default::default()
    }
}

// ── Provider ─────────────────────────────────────────────────────────

/// Provider answering from fixed listings and snapshots.
#[derive(Default)]
pub struct StubProvider {
    listings: HashMap<String, Vec<ListedContract>>,
    failing_listings: HashSet<String>,
    snapshots: HashMap<String, OptionSnapshot>,
    failing_snapshots: HashSet<String>,
    pub list_calls: AtomicUsize,
    pub snapshot_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(mut self, contract: ListedContract) -> Self {
        self.listings
            .entry(contract.underlying_ticker.clone())
            .or_default()
            .push(contract);
        self
    }

    pub fn with_failing_listing(mut self, underlying: &str) -> Self {
        self.failing_listings.insert(underlying.to_string());
        self
    }

    pub fn with_snapshot(mut self, ticker: &str, snapshot: OptionSnapshot) -> Self {
        self.snapshots.insert(ticker.to_string(), snapshot);
        self
    }

    pub fn with_snapshots(self, contracts: &[Contract], snapshot: OptionSnapshot) -> Self {
        contracts
            .iter()
            .fold(self, |provider, c| provider.with_snapshot(&c.ticker, snapshot.clone()))
    }

    pub fn with_failing_snapshot(mut self, ticker: &str) -> Self {
        self.failing_snapshots.insert(ticker.to_string());
        self
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    async fn list_contracts(
        &self,
        underlying: &str,
        contract_type: ContractType,
        _unexpired_only: bool,
    ) -> Result<Vec<ListedContract>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_listings.contains(underlying) {
            return Err(Error::Http(format!("HTTP 500 listing {}", underlying)));
        }

        Ok(self
            .listings
            .get(underlying)
            .map(|all| {
                all.iter()
                    .filter(|c| c.contract_type == contract_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_snapshot(&self, _underlying: &str, ticker: &str) -> Result<Option<OptionSnapshot>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_snapshots.contains(ticker) {
            return Err(Error::Http("HTTP 502".into()));
        }
        Ok(self.snapshots.get(ticker).cloned())
    }
}

// ── Store ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every attempt fails with a transient database error
    Transient,
    /// Only the first attempt fails
    TransientOnce,
    Connectivity,
}

impl Fault {
    fn error(&self, ticker: &str) -> Error {
        match self {
            Fault::Transient | Fault::TransientOnce => Error::Database(format!("deadlock writing {}", ticker)),
            Fault::Connectivity => Error::Connectivity("connection refused".into()),
        }
    }
}

/// Memory store that fails writes for chosen tickers and counts attempts.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    faults: Arc<HashMap<String, Fault>>,
    attempts: Arc<DashMap<String, usize>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, faults: &[(&str, Fault)]) -> Self {
        Self {
            inner,
            faults: Arc::new(faults.iter().map(|(t, f)| (t.to_string(), *f)).collect()),
            attempts: Arc::new(DashMap::new()),
        }
    }

    pub fn attempts(&self, ticker: &str) -> usize {
        self.attempts.get(ticker).map(|a| *a).unwrap_or(0)
    }

    fn check(&self, ticker: &str) -> Result<()> {
        let attempt = {
            let mut count = self.attempts.entry(ticker.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        match self.faults.get(ticker) {
            Some(Fault::TransientOnce) if attempt > 1 => Ok(()),
            Some(fault) => Err(fault.error(ticker)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContractStore for FlakyStore {
    async fn upsert_contract(&self, contract: &Contract) -> Result<()> {
        self.check(&contract.ticker)?;
        self.inner.upsert_contract(contract).await
    }

    async fn find_active_contracts(&self, since: DateTime<Utc>, offset: u64, limit: u64) -> Result<Vec<Contract>> {
        self.inner.find_active_contracts(since, offset, limit).await
    }

    async fn find_all_contracts(&self) -> Result<Vec<Contract>> {
        self.inner.find_all_contracts().await
    }

    async fn upsert_snapshot(&self, snapshot: &SnapshotRecord) -> Result<()> {
        self.check(&snapshot.ticker)?;
        self.inner.upsert_snapshot(snapshot).await
    }
}

#[derive(Default)]
pub struct FlakyConnector {
    pub store: FlakyStore,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl FlakyConnector {
    pub fn new(store: FlakyStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    type Store = FlakyStore;

    async fn connect(&self) -> Result<FlakyStore> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }

    async fn disconnect(&self, _store: Arc<FlakyStore>) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Memory store that holds each write open briefly and records the most
/// writes seen in flight at once.
#[derive(Clone, Default)]
pub struct TrackingStore {
    pub inner: MemoryStore,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl TrackingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn hold(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContractStore for TrackingStore {
    async fn upsert_contract(&self, contract: &Contract) -> Result<()> {
        self.hold().await;
        self.inner.upsert_contract(contract).await
    }

    async fn find_active_contracts(&self, since: DateTime<Utc>, offset: u64, limit: u64) -> Result<Vec<Contract>> {
        self.inner.find_active_contracts(since, offset, limit).await
    }

    async fn find_all_contracts(&self) -> Result<Vec<Contract>> {
        self.inner.find_all_contracts().await
    }

    async fn upsert_snapshot(&self, snapshot: &SnapshotRecord) -> Result<()> {
        self.hold().await;
        self.inner.upsert_snapshot(snapshot).await
    }
}

pub struct TrackingConnector {
    pub store: TrackingStore,
}

#[async_trait]
impl Connector for TrackingConnector {
    type Store = TrackingStore;

    async fn connect(&self) -> Result<TrackingStore> {
        Ok(self.store.clone())
    }

    async fn disconnect(&self, _store: Arc<TrackingStore>) -> Result<()> {
        Ok(())
    }
}
