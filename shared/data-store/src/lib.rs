mod client;
mod memory;
mod redis_source;
mod traits;

pub use client::{parse_runs, DataStoreClient, DataStoreError, ITEM_DELIMITER, READ_ATTEMPTS};
pub use memory::MemoryBatchSource;
pub use redis_source::{RedisBatchSource, REDIS_RETRAIN_DATA_DB};
pub use traits::BatchSource;

/// One training example, as stored by the data frontend.
pub type FeatureVector = Vec<f64>;
