pub const POLYGON_REST_URL: &str = "https://api.polygon.io";

/// Provider prefix carried by every option ticker.
pub const OPTION_TICKER_PREFIX: &str = "O:";

/// Exchange timezone used for expirations and the ingest session clock.
pub const MARKET_TIME_ZONE: chrono_tz::Tz = chrono_tz::America::New_York;

/// Upper bound the provider accepts for `limit` on reference endpoints.
pub const CONTRACTS_PAGE_LIMIT: u32 = 1000;

pub const DEFAULT_FETCH_CONCURRENCY: usize = 200;
pub const DEFAULT_DB_CONCURRENCY: usize = 10;
pub const DEFAULT_PAGE_SIZE: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SNAPSHOT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_SNAPSHOT_RETRY_DELAY_MS: u64 = 1_000;
