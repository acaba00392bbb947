use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Symbol format error: {0}")]
    Format(String),

    #[error("Retriever is not bound to an ingest session")]
    UnboundSession,

    #[error("Contract never active: {0}")]
    NeverActive(String),

    #[error("Duplicate write: {0}")]
    DuplicateWrite(String),

    #[error("Store connectivity error: {0}")]
    Connectivity(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a failed store write may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Format(_)
                | Error::UnboundSession
                | Error::NeverActive(_)
                | Error::DuplicateWrite(_)
                | Error::Connectivity(_)
                | Error::Config(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(e: sea_orm::DbErr) -> Self {
        use sea_orm::{DbErr, SqlErr};

        if let Some(SqlErr::UniqueConstraintViolation(msg)) = e.sql_err() {
            return Error::DuplicateWrite(msg);
        }

        match e {
            DbErr::Conn(err) => Error::Connectivity(err.to_string()),
            DbErr::ConnectionAcquire(err) => Error::Connectivity(err.to_string()),
            other => Error::Database(other.to_string()),
        }
    }
}
