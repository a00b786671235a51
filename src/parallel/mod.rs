//! Multi-provider fan-out: concurrent dispatch plus result aggregation.

pub mod aggregator;
pub mod executor;

pub use aggregator::{AggregationStrategy, ResultAggregator};
pub use executor::{ParallelConfig, ParallelExecutor};
