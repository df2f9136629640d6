//! Per-`(task, dataset)` sample buffering and flush-to-queue, ported from
//! `kl3m_data/api/loader/base.py::push_samples`.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use kl3m_core::{KlResult, QueueStore};
use kl3m_tasks::{passes_sanity_gate, TaskKind, WindowedSample};

/// Queue length at/above which a push pauses briefly, mirroring the
/// original's cooperative backpressure against the broker's consumers.
const DEFAULT_HIGH_WATER_MARK: u64 = 50_000;
const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct SamplePayload<'a> {
    input_ids: &'a [u32],
    labels: &'a [i64],
    attention_mask: &'a [u8],
    token_type_ids: &'a [u8],
}

pub struct SampleBuffers {
    sequence_length: usize,
    flush_batch_size: usize,
    high_water_mark: u64,
    buffers: HashMap<(TaskKind, String), Vec<WindowedSample>>,
}

impl SampleBuffers {
    pub fn new(sequence_length: usize, flush_batch_size: usize) -> Self {
        Self {
            sequence_length,
            flush_batch_size,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            buffers: HashMap::new(),
        }
    }

    pub fn with_high_water_mark(mut self, mark: u64) -> Self {
        self.high_water_mark = mark;
        self
    }

    /// Buffers one windowed sample for `(task, dataset)`, dropping it
    /// first if it fails the sanity gate. Flushes the buffer (pushing to
    /// `store`) once it reaches `flush_batch_size`.
    pub async fn offer(&mut self, task: TaskKind, dataset: &str, sample: WindowedSample, store: &dyn QueueStore) -> KlResult<()> {
        if !passes_sanity_gate(&sample, self.sequence_length) {
            return Ok(());
        }
        let key = (task, dataset.to_string());
        let buffer = self.buffers.entry(key.clone()).or_default();
        buffer.push(sample);
        if buffer.len() >= self.flush_batch_size {
            self.flush_one(&key, store).await?;
        }
        Ok(())
    }

    async fn flush_one(&mut self, key: &(TaskKind, String), store: &dyn QueueStore) -> KlResult<()> {
        let Some(samples) = self.buffers.get_mut(key) else { return Ok(()) };
        if samples.is_empty() {
            return Ok(());
        }
        let drained: Vec<WindowedSample> = samples.drain(..).collect();
        let (task, dataset) = key;
        let queue_key = format!("kl3m:samples:{}:{dataset}", task.as_str());

        // One random side chosen per flush, matching `push_samples`:
        // every sample in this flush is pushed from the same side.
        let push_from_head = rand::thread_rng().gen_bool(0.5);

        for sample in drained {
            let payload = SamplePayload {
                input_ids: &sample.input_ids,
                labels: &sample.labels,
                attention_mask: &sample.attention_mask,
                token_type_ids: &sample.token_type_ids,
            };
            let json = serde_json::to_vec(&payload).map_err(|e| kl3m_core::KlError::Other(anyhow::anyhow!(e)))?;
            let blob = kl3m_parse::deflate(&json)?;
            if push_from_head {
                store.lpush(&queue_key, blob).await?;
            } else {
                store.rpush(&queue_key, blob).await?;
            }
        }

        if store.llen(&queue_key).await? >= self.high_water_mark {
            tokio::time::sleep(BACKPRESSURE_SLEEP).await;
        }
        Ok(())
    }

    /// Flushes every non-empty buffer, regardless of size. Call this when
    /// shutting down so no buffered samples are lost.
    pub async fn flush_all(&mut self, store: &dyn QueueStore) -> KlResult<()> {
        let keys: Vec<(TaskKind, String)> = self.buffers.keys().cloned().collect();
        for key in keys {
            self.flush_one(&key, store).await?;
        }
        Ok(())
    }
}

#[allow(dead_code)]
pub fn default_high_water_mark() -> u64 {
    DEFAULT_HIGH_WATER_MARK
}

#[cfg(test)]
mod tests {
    use super::*;
    use kl3m_store::MemoryQueueStore;

    fn sample(len: usize) -> WindowedSample {
        WindowedSample {
            input_ids: vec![1; len],
            labels: vec![2i64; len],
            attention_mask: vec![1u8; len],
            token_type_ids: vec![0u8; len],
            task: TaskKind::Clm,
        }
    }

    #[tokio::test]
    async fn flush_fires_once_the_batch_size_is_reached() {
        let store = MemoryQueueStore::new();
        let mut buffers = SampleBuffers::new(10, 2);
        buffers.offer(TaskKind::Clm, "contracts", sample(10), &store).await.unwrap();
        assert_eq!(store.llen("kl3m:samples:clm:contracts").await.unwrap(), 0);
        buffers.offer(TaskKind::Clm, "contracts", sample(10), &store).await.unwrap();
        assert_eq!(store.llen("kl3m:samples:clm:contracts").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn samples_failing_the_sanity_gate_are_dropped_silently() {
        let store = MemoryQueueStore::new();
        let mut buffers = SampleBuffers::new(1000, 1);
        let mut degenerate = sample(1000);
        degenerate.attention_mask = vec![0u8; 1000];
        degenerate.labels = vec![-100i64; 1000];
        buffers.offer(TaskKind::Mlm, "contracts", degenerate, &store).await.unwrap();
        assert_eq!(store.llen("kl3m:samples:mlm:contracts").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn flush_all_drains_every_remaining_buffer() {
        let store = MemoryQueueStore::new();
        let mut buffers = SampleBuffers::new(10, 100);
        buffers.offer(TaskKind::Clm, "a", sample(10), &store).await.unwrap();
        buffers.offer(TaskKind::Mlm, "b", sample(10), &store).await.unwrap();
        buffers.flush_all(&store).await.unwrap();
        assert_eq!(store.llen("kl3m:samples:clm:a").await.unwrap(), 1);
        assert_eq!(store.llen("kl3m:samples:mlm:b").await.unwrap(), 1);
    }
}
