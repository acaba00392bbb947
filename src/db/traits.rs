//! Persistence port used by the ingestion core.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Contract, SnapshotRecord};

/// Storage for the contract universe and its snapshots.
///
/// Implementations must be safe to share across concurrent operations;
/// pooling is the implementation's concern.
#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Create the schema if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    /// Insert or fully overwrite the contract keyed by its ticker.
    async fn upsert_contract(&self, contract: &Contract) -> Result<()>;

    /// Contracts expiring at or after `active_since`, in a stable order,
    /// skipping `offset` and returning at most `limit`.
    async fn find_active_contracts(
        &self,
        active_since: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Contract>>;

    async fn find_all_contracts(&self) -> Result<Vec<Contract>>;

    /// Write a snapshot keyed by (`ticker`, `last_updated`). A row already
    /// present for the key yields `Error::DuplicateWrite`.
    async fn upsert_snapshot(&self, snapshot: &SnapshotRecord) -> Result<()>;
}

/// Opens and closes the store behind a [`ContractStore`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Store: ContractStore + 'static;

    async fn connect(&self) -> Result<Self::Store>;

    async fn disconnect(&self, store: Arc<Self::Store>) -> Result<()>;
}
