//! Object store and ordered-list queue store adapters.

pub mod memory;
pub mod queue;
pub mod retry;
pub mod s3;

pub use memory::{MemoryObjectStore, MemoryQueueStore};
pub use queue::RedisQueueStore;
pub use retry::RetryPolicy;
pub use s3::{S3Config, S3ObjectStore};
