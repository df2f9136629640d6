//! Ordered-list queue store adapter, backed by the `redis` crate against a
//! Redis-protocol-compatible server (the original targets `valkey`, which
//! speaks the same protocol).

use async_trait::async_trait;
use kl3m_core::{KlError, KlResult, QueueStore};
use redis::AsyncCommands;

pub struct RedisQueueStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisQueueStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn lpush(&self, key: &str, value: Vec<u8>) -> KlResult<()> {
        let mut conn = self.manager.clone();
        conn.lpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> KlResult<()> {
        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(key, value)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }

    async fn lpop(&self, key: &str) -> KlResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.lpop(key, None)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }

    async fn rpop(&self, key: &str) -> KlResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.rpop(key, None)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }

    async fn llen(&self, key: &str) -> KlResult<u64> {
        let mut conn = self.manager.clone();
        conn.llen(key)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }

    async fn lindex_end(&self, key: &str, from_tail: bool) -> KlResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let index: isize = if from_tail { -1 } else { 0 };
        conn.lindex(key, index)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }

    async fn keys_matching(&self, pattern: &str) -> KlResult<Vec<String>> {
        let mut conn = self.manager.clone();
        conn.keys(pattern)
            .await
            .map_err(|e| KlError::TransientIo(e.to_string()))
    }
}
