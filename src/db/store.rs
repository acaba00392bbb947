use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{ColumnDef, Expr, ForeignKey, ForeignKeyAction, Index, OnConflict, Table};
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, EntityName, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::models::{contract, snapshot};
use crate::db::traits::{Connector, ContractStore};
use crate::error::{Error, Result};
use crate::types::{Contract, SnapshotRecord};

const SNAPSHOT_KEY_INDEX: &str = "idx_snapshots_ticker_last_updated";
const EXPIRATION_INDEX: &str = "idx_contracts_expiration_date";

/// Relational store backed by sea-orm (Postgres or MySQL/TiDB, SQLite in tests).
pub struct SeaOrmStore {
    connection: DatabaseConnection,
}

impl SeaOrmStore {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut options = ConnectOptions::new(config.url.clone());
        options
            .max_connections(config.max_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(false);

        let connection = Database::connect(options)
            .await
            .map_err(|e| Error::Connectivity(format!("Failed to connect to database: {}", e)))?;

        info!(
            "✅ Connected to {:?} database (pool size {})",
            connection.get_database_backend(),
            config.max_connections
        );
        Ok(Self { connection })
    }

    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub async fn create_tables(&self) -> Result<()> {
        info!("Creating contracts and snapshots tables...");

        for statement in schema_statements(self.connection.get_database_backend()) {
            self.connection.execute(statement).await?;
        }

        info!("✅ Schema ready");
        Ok(())
    }
}

/// DDL for both tables. Every statement is safe to re-run.
pub fn schema_statements(backend: DbBackend) -> Vec<Statement> {
    let expiration_index = Index::create()
        .name(EXPIRATION_INDEX)
        .table(contract::Entity.table_ref())
        .col(contract::Column::ExpirationDate)
        .to_owned();

    let mut contracts = Table::create();
    contracts
        .table(contract::Entity.table_ref())
        .if_not_exists()
        .col(
            ColumnDef::new(contract::Column::Ticker)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(contract::Column::UnderlyingTicker)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(contract::Column::ContractType)
                .string_len(4)
                .not_null()
                .check(Expr::col(contract::Column::ContractType).is_in(["CALL", "PUT"])),
        )
        .col(
            ColumnDef::new(contract::Column::ExpirationDate)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(contract::Column::StrikePrice)
                .double()
                .not_null(),
        );

    // MySQL has no CREATE INDEX IF NOT EXISTS, so the index goes inline there
    if backend == DbBackend::MySql {
        contracts.index(&mut expiration_index.clone());
    }

    let snapshots = Table::create()
        .table(snapshot::Entity.table_ref())
        .if_not_exists()
        .col(
            ColumnDef::new(snapshot::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(snapshot::Column::Ticker).string_len(64).not_null())
        .col(ColumnDef::new(snapshot::Column::OpenInterest).big_integer())
        .col(ColumnDef::new(snapshot::Column::Volume).double())
        .col(ColumnDef::new(snapshot::Column::ImpliedVol).double())
        .col(ColumnDef::new(snapshot::Column::Greeks).json_binary())
        .col(ColumnDef::new(snapshot::Column::LastPrice).double())
        .col(ColumnDef::new(snapshot::Column::DayOpen).double())
        .col(ColumnDef::new(snapshot::Column::DayClose).double())
        .col(ColumnDef::new(snapshot::Column::DayChange).double())
        .col(
            ColumnDef::new(snapshot::Column::LastUpdated)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .col(
            ColumnDef::new(snapshot::Column::LastCrawled)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .index(
            Index::create()
                .unique()
                .name(SNAPSHOT_KEY_INDEX)
                .col(snapshot::Column::Ticker)
                .col(snapshot::Column::LastUpdated),
        )
        .foreign_key(
            ForeignKey::create()
                .name("fk_snapshots_contract")
                .from(snapshot::Entity.table_ref(), snapshot::Column::Ticker)
                .to(contract::Entity.table_ref(), contract::Column::Ticker)
                .on_delete(ForeignKeyAction::Restrict),
        )
        .to_owned();

    let mut statements = vec![backend.build(&contracts), backend.build(&snapshots)];
    if backend != DbBackend::MySql {
        let mut standalone = expiration_index;
        standalone.if_not_exists();
        statements.push(backend.build(&standalone));
    }
    statements
}

fn contract_active_model(contract: &Contract) -> contract::ActiveModel {
    contract::ActiveModel {
        ticker: ActiveValue::Set(contract.ticker.clone()),
        underlying_ticker: ActiveValue::Set(contract.underlying.clone()),
        contract_type: ActiveValue::Set(contract.contract_type.as_str().to_string()),
        expiration_date: ActiveValue::Set(contract.expiration),
        strike_price: ActiveValue::Set(contract.strike),
    }
}

fn snapshot_active_model(record: &SnapshotRecord) -> Result<snapshot::ActiveModel> {
    let greeks = record.greeks.map(serde_json::to_value).transpose()?;

    Ok(snapshot::ActiveModel {
        id: ActiveValue::NotSet,
        ticker: ActiveValue::Set(record.ticker.clone()),
        open_interest: ActiveValue::Set(record.open_interest),
        volume: ActiveValue::Set(record.volume),
        implied_vol: ActiveValue::Set(record.implied_volatility),
        greeks: ActiveValue::Set(greeks),
        last_price: ActiveValue::Set(record.last_price),
        day_open: ActiveValue::Set(record.day_open),
        day_close: ActiveValue::Set(record.day_close),
        day_change: ActiveValue::Set(record.day_change_percent),
        last_updated: ActiveValue::Set(record.last_updated),
        last_crawled: ActiveValue::Set(record.last_crawled),
    })
}

impl TryFrom<contract::Model> for Contract {
    type Error = Error;

    fn try_from(model: contract::Model) -> Result<Self> {
        Ok(Contract {
            contract_type: model.contract_type.parse()?,
            ticker: model.ticker,
            underlying: model.underlying_ticker,
            strike: model.strike_price,
            expiration: model.expiration_date,
        })
    }
}

#[async_trait]
impl ContractStore for SeaOrmStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.create_tables().await
    }

    async fn upsert_contract(&self, contract: &Contract) -> Result<()> {
        let on_conflict = OnConflict::column(contract::Column::Ticker)
            .update_columns([
                contract::Column::UnderlyingTicker,
                contract::Column::ContractType,
                contract::Column::ExpirationDate,
                contract::Column::StrikePrice,
            ])
            .to_owned();

        contract::Entity::insert(contract_active_model(contract))
            .on_conflict(on_conflict)
            .exec(&self.connection)
            .await?;

        Ok(())
    }

    async fn find_active_contracts(
        &self,
        active_since: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Contract>> {
        contract::Entity::find()
            .filter(contract::Column::ExpirationDate.gte(active_since))
            .order_by_asc(contract::Column::Ticker)
            .offset(offset)
            .limit(limit)
            .all(&self.connection)
            .await?
            .into_iter()
            .map(Contract::try_from)
            .collect()
    }

    async fn find_all_contracts(&self) -> Result<Vec<Contract>> {
        contract::Entity::find()
            .order_by_asc(contract::Column::Ticker)
            .all(&self.connection)
            .await?
            .into_iter()
            .map(Contract::try_from)
            .collect()
    }

    async fn upsert_snapshot(&self, record: &SnapshotRecord) -> Result<()> {
        snapshot::Entity::insert(snapshot_active_model(record)?)
            .exec(&self.connection)
            .await?;

        Ok(())
    }
}

/// Opens a pooled sea-orm connection per ingest run.
pub struct SeaOrmConnector {
    config: DatabaseConfig,
}

impl SeaOrmConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for SeaOrmConnector {
    type Store = SeaOrmStore;

    async fn connect(&self) -> Result<SeaOrmStore> {
        SeaOrmStore::new(&self.config).await
    }

    async fn disconnect(&self, store: Arc<SeaOrmStore>) -> Result<()> {
        store.connection().clone().close().await?;
        Ok(())
    }
}
