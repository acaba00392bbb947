pub mod app;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod filter;
pub mod gate;
pub mod ingestor;
pub mod logging;
pub mod providers;
pub mod retriever;
pub mod retry;
pub mod symbol;
pub mod types;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
