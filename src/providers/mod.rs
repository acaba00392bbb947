pub mod batch;
pub mod polygon;
pub mod traits;

pub use batch::fetch_snapshots_batch;
pub use polygon::PolygonClient;
pub use traits::{ListedContract, MarketDataProvider};
