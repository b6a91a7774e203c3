pub mod aggregator;
pub mod levels;
pub mod schema;
pub mod types;

pub use aggregator::Aggregator;
pub use types::{AggregationConfig, AggregationResult};
