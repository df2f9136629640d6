//! Capability traits every other crate in the workspace is written
//! against. Mirrors the shape of `Operator`/`Source`/`Sink` in `rde-core`:
//! small async traits, implementations live in `kl3m-store`.

use crate::error::KlResult;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Thin capability over a flat key -> bytes store. All other components
/// depend only on this trait, never on a concrete backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> KlResult<Vec<u8>>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> KlResult<()>;
    async fn head(&self, key: &str) -> KlResult<bool>;

    /// Lazily enumerate every key under `prefix`. Must tolerate result sets
    /// in the tens of millions without materializing them eagerly.
    fn list(&self, prefix: &str) -> BoxStream<'_, KlResult<String>>;

    /// List the immediate common prefixes under `prefix`, as if listing
    /// with `delimiter` (`/` by default).
    async fn list_common_prefixes(&self, prefix: &str, delimiter: &str) -> KlResult<Vec<String>>;
}

/// Capability over a Redis-style ordered-list (LIST) store, used as the
/// coordination medium between the Training-sample Producer and the
/// Sample Broker.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn lpush(&self, key: &str, value: Vec<u8>) -> KlResult<()>;
    async fn rpush(&self, key: &str, value: Vec<u8>) -> KlResult<()>;
    async fn lpop(&self, key: &str) -> KlResult<Option<Vec<u8>>>;
    async fn rpop(&self, key: &str) -> KlResult<Option<Vec<u8>>>;
    async fn llen(&self, key: &str) -> KlResult<u64>;
    /// `lindex(key, 0)` for the head, `lindex(key, -1)` for the tail.
    async fn lindex_end(&self, key: &str, from_tail: bool) -> KlResult<Option<Vec<u8>>>;
    async fn keys_matching(&self, pattern: &str) -> KlResult<Vec<String>>;
}

/// A deterministic, referentially transparent tokenizer capability. The
/// core consumes this as a pure function; it does not implement
/// tokenization itself.
pub trait Tokenizer: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, text: &str, add_special_tokens: bool) -> KlResult<Vec<u32>>;
    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> KlResult<String>;
    fn id_of_token(&self, token: &str) -> Option<u32>;
    fn vocab_size(&self) -> usize;
}
