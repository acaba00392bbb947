use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DB_CONCURRENCY, DEFAULT_FETCH_CONCURRENCY, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SNAPSHOT_MAX_ATTEMPTS, DEFAULT_SNAPSHOT_RETRY_DELAY_MS, POLYGON_REST_URL,
};
use crate::error::{Error, Result};
use crate::ingestor::{DiscoveryFailurePolicy, SnapshotFailurePolicy};
use crate::types::IngestParams;

#[derive(Debug, Clone)]
pub struct Config {
    pub polygon: PolygonConfig,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub fetch_concurrency: usize,
    pub db_concurrency: usize,
    pub page_size: u64,
    pub snapshot_max_attempts: usize,
    pub snapshot_retry_delay: Duration,
    pub targets: Vec<IngestParams>,
    pub discovery_failure_policy: DiscoveryFailurePolicy,
    pub snapshot_failure_policy: SnapshotFailurePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{} not set", key)))
        };

        let api_key = required("POLYGON_API_KEY")?;
        let database_url = required("DATABASE_URL")?;

        let db_concurrency = parse_or(&lookup, "DB_CONCURRENCY", DEFAULT_DB_CONCURRENCY)?;

        let targets = match lookup("INGEST_TARGETS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(IngestParams::from_str)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Config {
            polygon: PolygonConfig {
                api_key,
                base_url: lookup("POLYGON_BASE_URL").unwrap_or_else(|| POLYGON_REST_URL.to_string()),
                request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: db_concurrency as u32,
                connect_timeout_secs: parse_or(&lookup, "DB_CONNECT_TIMEOUT_SECS", 10)?,
            },
            ingest: IngestConfig {
                fetch_concurrency: parse_or(&lookup, "FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?,
                db_concurrency,
                page_size: parse_or(&lookup, "PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
                snapshot_max_attempts: parse_or(&lookup, "SNAPSHOT_MAX_ATTEMPTS", DEFAULT_SNAPSHOT_MAX_ATTEMPTS)?,
                snapshot_retry_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "SNAPSHOT_RETRY_DELAY_MS",
                    DEFAULT_SNAPSHOT_RETRY_DELAY_MS,
                )?),
                targets,
                discovery_failure_policy: parse_or(&lookup, "DISCOVERY_FAILURE_POLICY", DiscoveryFailurePolicy::default())?,
                snapshot_failure_policy: parse_or(&lookup, "SNAPSHOT_FAILURE_POLICY", SnapshotFailurePolicy::default())?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
