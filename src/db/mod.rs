pub mod memory;
pub mod models;
pub mod store;
pub mod traits;

pub use memory::{MemoryConnector, MemoryStore};
pub use store::{schema_statements, SeaOrmConnector, SeaOrmStore};
pub use traits::{Connector, ContractStore};
