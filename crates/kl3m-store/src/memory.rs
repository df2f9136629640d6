//! In-memory fakes for `ObjectStore` and `QueueStore`, used by downstream
//! crates' tests so that pipeline/export/broker/producer logic can be
//! exercised without a network dependency.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use kl3m_core::{KlError, KlResult, ObjectStore, QueueStore};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> KlResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| KlError::MalformedKey(format!("not found: {key}")))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> KlResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn head(&self, key: &str) -> KlResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn list(&self, prefix: &str) -> BoxStream<'_, KlResult<String>> {
        let keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Box::pin(stream::iter(keys.into_iter().map(Ok)))
    }

    async fn list_common_prefixes(&self, prefix: &str, delimiter: &str) -> KlResult<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        let mut prefixes: Vec<String> = Vec::new();
        for key in objects.keys().filter(|k| k.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            if let Some(idx) = rest.find(delimiter) {
                let common = format!("{prefix}{}", &rest[..=idx]);
                if !prefixes.contains(&common) {
                    prefixes.push(common);
                }
            }
        }
        Ok(prefixes)
    }
}

#[derive(Default)]
pub struct MemoryQueueStore {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn lpush(&self, key: &str, value: Vec<u8>) -> KlResult<()> {
        self.queues
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_front(value);
        Ok(())
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> KlResult<()> {
        self.queues
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(value);
        Ok(())
    }

    async fn lpop(&self, key: &str) -> KlResult<Option<Vec<u8>>> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|q| q.pop_front()))
    }

    async fn rpop(&self, key: &str) -> KlResult<Option<Vec<u8>>> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|q| q.pop_back()))
    }

    async fn llen(&self, key: &str) -> KlResult<u64> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get(key)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }

    async fn lindex_end(&self, key: &str, from_tail: bool) -> KlResult<Option<Vec<u8>>> {
        let queues = self.queues.lock().unwrap();
        let q = match queues.get(key) {
            Some(q) => q,
            None => return Ok(None),
        };
        Ok(if from_tail {
            q.back().cloned()
        } else {
            q.front().cloned()
        })
    }

    async fn keys_matching(&self, pattern: &str) -> KlResult<Vec<String>> {
        // Supports a single trailing '*' glob, sufficient for the
        // `kl3m:samples:<task>:*` / `kl3m:samples:*:<task>:*` patterns used
        // by the broker and producer.
        let queues = self.queues.lock().unwrap();
        if let Some(prefix) = pattern.strip_suffix('*') {
            Ok(queues.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        } else {
            Ok(queues.keys().filter(|k| k.as_str() == pattern).cloned().collect())
        }
    }
}
