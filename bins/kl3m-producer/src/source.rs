//! Streaming source-document loader: pages through a dataset's stage-3
//! parquet objects, optionally interleaving several datasets, and reloads
//! from the start once every dataset has been exhausted in a pass, running
//! as an infinite producer.

use std::sync::Arc;

use rand::seq::SliceRandom;

use kl3m_core::{KlResult, ObjectStore, Stage};

/// One source document ready for tokenization: its owning dataset and the
/// tokenizer vocabulary its stored tokens were encoded with.
pub struct SourceDocument {
    pub dataset_id: String,
    pub mime_type: String,
    pub tokens: Vec<u32>,
}

/// Interleaves streaming reads over a fixed set of datasets, reshuffling
/// and reloading once every dataset's key list is exhausted.
pub struct DatasetSource {
    store: Arc<dyn ObjectStore>,
    dataset_ids: Vec<String>,
    shuffle: bool,
    cursors: Vec<std::collections::VecDeque<(String, String)>>,
    next_cursor: usize,
}

impl DatasetSource {
    pub fn new(store: Arc<dyn ObjectStore>, dataset_ids: Vec<String>, shuffle: bool) -> Self {
        Self {
            store,
            dataset_ids,
            shuffle,
            cursors: Vec::new(),
            next_cursor: 0,
        }
    }

    async fn reload(&mut self) -> KlResult<()> {
        let mut cursors = Vec::with_capacity(self.dataset_ids.len());
        for dataset_id in &self.dataset_ids {
            let prefix = format!("{}/{dataset_id}/", Stage::Parquet.prefix());
            let mut keys: Vec<String> = self
                .store
                .list(&prefix)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .filter_map(Result::ok)
                .map(|key| (dataset_id.clone(), key))
                .collect();
            if self.shuffle {
                keys.shuffle(&mut rand::thread_rng());
            }
            cursors.push(keys.into());
        }
        self.cursors = cursors;
        Ok(())
    }

    /// Returns the next source document, round-robining across datasets
    /// and reloading from scratch (an "all-exhausted" pass) once every
    /// dataset cursor is empty.
    pub async fn next(&mut self) -> KlResult<Option<SourceDocument>> {
        if self.cursors.is_empty() || self.cursors.iter().all(|c| c.is_empty()) {
            self.reload().await?;
        }
        if self.dataset_ids.is_empty() {
            return Ok(None);
        }

        let n = self.cursors.len();
        for offset in 0..n {
            let idx = (self.next_cursor + offset) % n;
            if let Some((dataset_id, key)) = self.cursors[idx].pop_front() {
                self.next_cursor = (idx + 1) % n;
                let bytes = self.store.get(&key).await?;
                let artifacts = kl3m_columnar::deserialize(&bytes)?;
                if let Some(artifact) = artifacts.into_iter().next() {
                    if let Some((mime_type, tokens)) = artifact.representations.into_iter().next() {
                        return Ok(Some(SourceDocument { dataset_id, mime_type, tokens }));
                    }
                }
            }
        }
        Ok(None)
    }
}
