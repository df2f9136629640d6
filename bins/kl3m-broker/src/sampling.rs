//! Uniform and weighted batch-sampling algorithms over queues, ported from
//! `kl3m_data/api/broker.py`'s batch endpoint. Grounded on the ordered-list
//! queue contract in `kl3m_core::traits::QueueStore`.

use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;

use kl3m_core::{BrokerPreconditionFailed, KlError, KlResult, QueueStore};

pub const SAMPLE_QUEUE_PREFIX: &str = "kl3m:samples:";
pub const SOURCE_QUEUE_PREFIX: &str = "kl3m:sources:";

/// How many distinct dataset queues a uniform batch must be drawn from,
/// absent any dataset-specific weighting.
pub const MIN_DATASETS: usize = 1;

fn sample_queue_key(task: &str, dataset: &str) -> String {
    format!("{SAMPLE_QUEUE_PREFIX}{task}:{dataset}")
}

/// Enumerates every sample queue for `task`, returning `(dataset, key)`
/// pairs parsed out of the `kl3m:samples:<task>:<dataset>` naming scheme.
async fn list_task_queues(store: &dyn QueueStore, task: &str) -> KlResult<Vec<(String, String)>> {
    let pattern = format!("{SAMPLE_QUEUE_PREFIX}{task}:*");
    let keys = store.keys_matching(&pattern).await?;
    let prefix = format!("{SAMPLE_QUEUE_PREFIX}{task}:");
    Ok(keys
        .into_iter()
        .filter_map(|k| k.strip_prefix(&prefix).map(|dataset| (dataset.to_string(), k)))
        .collect())
}

async fn pop_random_side(store: &dyn QueueStore, key: &str) -> KlResult<Option<Vec<u8>>> {
    let from_head = rand::thread_rng().gen_bool(0.5);
    if from_head {
        store.lpop(key).await
    } else {
        store.rpop(key).await
    }
}

fn decode_record(raw: &[u8]) -> KlResult<Value> {
    let json_bytes = kl3m_parse::inflate(raw)?;
    serde_json::from_slice(&json_bytes).map_err(|e| KlError::Other(anyhow::anyhow!(e)))
}

/// Uniform batch: enumerate all queues for `task`, shuffle, and pop from
/// randomly-shuffled queues in round-robin fashion until `batch_size`
/// samples have been drawn from at least [`MIN_DATASETS`] distinct queues.
pub async fn sample_uniform(store: Arc<dyn QueueStore>, task: &str, batch_size: usize) -> KlResult<Vec<Value>> {
    let mut queues = list_task_queues(store.as_ref(), task).await?;
    if queues.is_empty() {
        return Err(BrokerPreconditionFailed::NoQueuesAvailable.into());
    }

    let total: u64 = {
        let mut sum = 0u64;
        for (_, key) in &queues {
            sum += store.llen(key).await?;
        }
        sum
    };
    if total < batch_size as u64 {
        return Err(BrokerPreconditionFailed::InsufficientData.into());
    }

    queues.shuffle(&mut rand::thread_rng());

    let mut accumulator = Vec::with_capacity(batch_size);
    let mut covered = std::collections::HashSet::new();

    'outer: loop {
        if accumulator.len() >= batch_size && covered.len() >= MIN_DATASETS {
            break;
        }
        let mut made_progress = false;
        for (dataset, key) in &queues {
            if accumulator.len() >= batch_size {
                break 'outer;
            }
            if let Some(raw) = pop_random_side(store.as_ref(), key).await? {
                made_progress = true;
                if let Ok(record) = decode_record(&raw) {
                    accumulator.push(record);
                    covered.insert(dataset.clone());
                }
            }
        }
        if !made_progress {
            break;
        }
    }

    accumulator.shuffle(&mut rand::thread_rng());
    accumulator.truncate(batch_size);
    Ok(accumulator)
}

/// Weighted batch: as [`sample_uniform`], but queues are restricted to
/// `weights`' keys and drawn with probability proportional to weight.
pub async fn sample_weighted(
    store: Arc<dyn QueueStore>,
    task: &str,
    batch_size: usize,
    weights: &HashMap<String, f64>,
) -> KlResult<Vec<Value>> {
    let all_queues = list_task_queues(store.as_ref(), task).await?;
    let queues: Vec<(String, String, f64)> = all_queues
        .into_iter()
        .filter_map(|(dataset, key)| weights.get(&dataset).map(|&w| (dataset, key, w)))
        .filter(|(_, _, w)| *w > 0.0)
        .collect();

    if queues.is_empty() {
        return Err(BrokerPreconditionFailed::NoQueuesAvailable.into());
    }

    let total: u64 = {
        let mut sum = 0u64;
        for (_, key, _) in &queues {
            sum += store.llen(key).await?;
        }
        sum
    };
    if total < batch_size as u64 {
        return Err(BrokerPreconditionFailed::InsufficientData.into());
    }

    let total_weight: f64 = queues.iter().map(|(_, _, w)| w).sum();
    let mut accumulator = Vec::with_capacity(batch_size);
    let mut exhausted = std::collections::HashSet::new();

    while accumulator.len() < batch_size {
        if exhausted.len() >= queues.len() {
            break;
        }
        let pick = {
            let mut roll = rand::thread_rng().gen_range(0.0..total_weight);
            let mut chosen = None;
            for (dataset, key, weight) in &queues {
                if exhausted.contains(dataset) {
                    continue;
                }
                if roll < *weight {
                    chosen = Some(key.clone());
                    break;
                }
                roll -= weight;
            }
            chosen.or_else(|| queues.iter().find(|(d, _, _)| !exhausted.contains(d)).map(|(_, k, _)| k.clone()))
        };
        let Some(key) = pick else { break };

        match pop_random_side(store.as_ref(), &key).await? {
            Some(raw) => {
                if let Ok(record) = decode_record(&raw) {
                    accumulator.push(record);
                }
            }
            None => {
                let dataset = queues.iter().find(|(_, k, _)| *k == key).map(|(d, _, _)| d.clone());
                if let Some(dataset) = dataset {
                    exhausted.insert(dataset);
                }
            }
        }
    }

    accumulator.shuffle(&mut rand::thread_rng());
    accumulator.truncate(batch_size);
    Ok(accumulator)
}

/// `GET /status` response body: source-queue lengths, sample-queue
/// lengths, and per-task rollups across every known task and dataset.
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub sources: HashMap<String, u64>,
    pub samples: HashMap<String, HashMap<String, u64>>,
    pub task_counts: HashMap<String, u64>,
}

/// `GET /status`: per-queue and per-task counts across every known task
/// and dataset, plus per-dataset source-queue lengths.
pub async fn queue_status(store: &dyn QueueStore) -> KlResult<QueueStatus> {
    let sample_keys = store.keys_matching(&format!("{SAMPLE_QUEUE_PREFIX}*")).await?;
    let mut samples: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut task_counts: HashMap<String, u64> = HashMap::new();
    for key in sample_keys {
        if let Some(rest) = key.strip_prefix(SAMPLE_QUEUE_PREFIX) {
            if let Some((task, dataset)) = rest.split_once(':') {
                let len = store.llen(&key).await?;
                samples.entry(task.to_string()).or_default().insert(dataset.to_string(), len);
                *task_counts.entry(task.to_string()).or_insert(0) += len;
            }
        }
    }

    let source_keys = store.keys_matching(&format!("{SOURCE_QUEUE_PREFIX}*")).await?;
    let mut sources: HashMap<String, u64> = HashMap::new();
    for key in source_keys {
        if let Some(dataset) = key.strip_prefix(SOURCE_QUEUE_PREFIX) {
            let len = store.llen(&key).await?;
            sources.insert(dataset.to_string(), len);
        }
    }

    Ok(QueueStatus { sources, samples, task_counts })
}

/// `GET /source/random`: one record non-destructively peeked from the
/// source queues (`kl3m:sources:<dataset>`). Ported from
/// `api.py::get_random_source`'s `lindex(key, 0 | -1)` peek — unlike batch
/// sampling, this never consumes the queue.
pub async fn sample_random_source(store: Arc<dyn QueueStore>) -> KlResult<Value> {
    let keys = store.keys_matching(&format!("{SOURCE_QUEUE_PREFIX}*")).await?;
    if keys.is_empty() {
        return Err(BrokerPreconditionFailed::NoQueuesAvailable.into());
    }
    let mut shuffled = keys;
    shuffled.shuffle(&mut rand::thread_rng());

    for key in shuffled {
        let from_tail = rand::thread_rng().gen_bool(0.5);
        if let Some(raw) = store.lindex_end(&key, from_tail).await? {
            return decode_record(&raw);
        }
    }
    Err(BrokerPreconditionFailed::InsufficientData.into())
}

#[allow(dead_code)]
pub fn sample_queue_key_for(task: &str, dataset: &str) -> String {
    sample_queue_key(task, dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use kl3m_store::MemoryQueueStore;
    use std::io::Write;

    fn deflate_json(value: &Value) -> Vec<u8> {
        let bytes = serde_json::to_vec(value).unwrap();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn uniform_sampling_fails_fast_when_no_queues_exist() {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let err = sample_uniform(store, "mlm", 4).await.unwrap_err();
        assert!(matches!(err, KlError::BrokerPreconditionFailed(BrokerPreconditionFailed::NoQueuesAvailable)));
    }

    #[tokio::test]
    async fn uniform_sampling_rejects_insufficient_total_data() {
        let store = MemoryQueueStore::new();
        store.rpush("kl3m:samples:mlm:contracts", deflate_json(&serde_json::json!({"a": 1}))).await.unwrap();
        let store: Arc<dyn QueueStore> = Arc::new(store);
        let err = sample_uniform(store, "mlm", 4).await.unwrap_err();
        assert!(matches!(err, KlError::BrokerPreconditionFailed(BrokerPreconditionFailed::InsufficientData)));
    }

    #[tokio::test]
    async fn uniform_sampling_returns_exactly_batch_size_when_available() {
        let store = MemoryQueueStore::new();
        for i in 0..8 {
            store
                .rpush("kl3m:samples:mlm:contracts", deflate_json(&serde_json::json!({"i": i})))
                .await
                .unwrap();
        }
        let store: Arc<dyn QueueStore> = Arc::new(store);
        let batch = sample_uniform(store, "mlm", 5).await.unwrap();
        assert_eq!(batch.len(), 5);
    }

    #[tokio::test]
    async fn weighted_sampling_only_draws_from_weighted_datasets() {
        let store = MemoryQueueStore::new();
        for i in 0..4 {
            store
                .rpush("kl3m:samples:clm:a", deflate_json(&serde_json::json!({"i": i})))
                .await
                .unwrap();
        }
        for i in 0..4 {
            store
                .rpush("kl3m:samples:clm:b", deflate_json(&serde_json::json!({"i": i})))
                .await
                .unwrap();
        }
        let store: Arc<dyn QueueStore> = Arc::new(store);
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        let batch = sample_weighted(store, "clm", 3, &weights).await.unwrap();
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn random_source_peeks_without_consuming_the_queue() {
        let store = MemoryQueueStore::new();
        store.rpush("kl3m:sources:contracts", deflate_json(&serde_json::json!({"id": 1}))).await.unwrap();
        let store: Arc<dyn QueueStore> = Arc::new(store);

        for _ in 0..5 {
            sample_random_source(store.clone()).await.unwrap();
        }

        assert_eq!(store.llen("kl3m:sources:contracts").await.unwrap(), 1);
    }
}
