//! Producer/consumer JSONL export pipeline: lister -> fetcher
//! pool -> bounded channel -> single writer. Grounded on
//! `parquet_to_jsonl.py`'s thread-pool fetch + single-writer-thread shape.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use kl3m_core::{KlResult, ObjectStore, Stage, Tokenizer};
use kl3m_tasks::{adjusted_score, compute_metrics};

use crate::dedup::DedupSet;
use crate::record::{ExportPayload, ExportRecord};
use crate::tuning::ExportConcurrency;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tokens,
    Text,
}

pub struct ExportOptions {
    pub format: OutputFormat,
    pub dedup: bool,
    /// Quality threshold above which a document is dropped. `None`
    /// (or `include_all_documents`) disables the gate entirely.
    pub quality_threshold: Option<f64>,
    pub include_all_documents: bool,
    pub concurrency: ExportConcurrency,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Tokens,
            dedup: true,
            quality_threshold: None,
            include_all_documents: false,
            concurrency: ExportConcurrency::fixed_defaults(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExportStats {
    pub written: usize,
    pub duplicates_dropped: usize,
    pub quality_dropped: usize,
    pub fetch_errors: usize,
}

/// Cooperative cancellation handle; setting this stops producers from
/// enqueuing further work at their next queue boundary.
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Exports every stage-3 key under `dataset_id` (optionally narrowed by
/// `key_prefix`) to `sink` as a gzip stream of newline-delimited JSON.
pub async fn export_dataset(
    store: Arc<dyn ObjectStore>,
    dataset_id: &str,
    key_prefix: Option<&str>,
    tokenizer: Option<&dyn Tokenizer>,
    opts: ExportOptions,
    stop: StopFlag,
    mut sink: impl std::io::Write + Send,
) -> KlResult<ExportStats> {
    if matches!(opts.format, OutputFormat::Text) && tokenizer.is_none() {
        return Err(kl3m_core::KlError::Other(anyhow::anyhow!(
            "text output format requires a tokenizer to decode with"
        )));
    }

    let prefix = match key_prefix {
        Some(p) => format!("{}/{dataset_id}/{}", Stage::Parquet.prefix(), p.trim_start_matches('/')),
        None => format!("{}/{dataset_id}/", Stage::Parquet.prefix()),
    };

    let keys: Vec<String> = store.list(&prefix).collect::<Vec<_>>().await.into_iter().filter_map(Result::ok).collect();

    let dedup = Arc::new(DedupSet::with_defaults());
    let (tx, mut rx) = mpsc::channel::<ExportRecord>(opts.concurrency.queue_depth);

    let fetch_errors = Arc::new(AtomicUsize::new(0));
    let duplicates_dropped = Arc::new(AtomicUsize::new(0));
    let quality_dropped = Arc::new(AtomicUsize::new(0));

    let fetchers_fetch_errors = fetch_errors.clone();
    let fetchers_duplicates_dropped = duplicates_dropped.clone();
    let fetchers_quality_dropped = quality_dropped.clone();
    let fetchers_dedup = dedup.clone();
    let fetchers_store = store.clone();
    let fetchers_stop = stop.clone();
    let dataset_id_owned = dataset_id.to_string();
    let fetchers_tx = tx;

    let fetch_fut = stream::iter(keys).for_each_concurrent(opts.concurrency.fetchers, move |key| {
        let store = fetchers_store.clone();
        let dedup = fetchers_dedup.clone();
        let stop = fetchers_stop.clone();
        let tx = fetchers_tx.clone();
        let dataset_id = dataset_id_owned.clone();
        let fetch_errors = fetchers_fetch_errors.clone();
        let duplicates_dropped = fetchers_duplicates_dropped.clone();
        let quality_dropped = fetchers_quality_dropped.clone();
        let format = opts.format;
        let dedup_enabled = opts.dedup;
        let quality_threshold = opts.quality_threshold;
        let include_all = opts.include_all_documents;

        async move {
            if stop.is_stopped() {
                return;
            }
            match fetch_and_build_records(store.as_ref(), &key, &dataset_id, tokenizer, format).await {
                Ok(records) => {
                    for mut record in records {
                        if !include_all {
                            if let Some(threshold) = quality_threshold {
                                if let Some(ref metrics) = record.metrics {
                                    let score = adjusted_score(metrics);
                                    record.score = Some(score);
                                    if score > threshold {
                                        quality_dropped.fetch_add(1, Ordering::Relaxed);
                                        continue;
                                    }
                                }
                            }
                        }
                        if dedup_enabled {
                            let is_new = match &record.payload {
                                ExportPayload::Tokens { tokens } => dedup.check_tokens(tokens),
                                ExportPayload::Text { text } => dedup.check_text(text),
                            };
                            if !is_new {
                                duplicates_dropped.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }
                        }
                        if tx.send(record).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "failed to fetch or decode stage-3 object");
                    fetch_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    });

    let writer_fut = async move {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut written = 0usize;
        while let Some(record) = rx.recv().await {
            let line = serde_json::to_string(&record)
                .map_err(|e| kl3m_core::KlError::Other(anyhow::anyhow!(e)))?;
            encoder
                .write_all(line.as_bytes())
                .and_then(|_| encoder.write_all(b"\n"))
                .map_err(|e| kl3m_core::KlError::Other(anyhow::anyhow!(e)))?;
            written += 1;
        }
        let bytes = encoder.finish().map_err(|e| kl3m_core::KlError::Other(anyhow::anyhow!(e)))?;
        sink.write_all(&bytes).map_err(|e| kl3m_core::KlError::Other(anyhow::anyhow!(e)))?;
        Ok::<usize, kl3m_core::KlError>(written)
    };

    let (_, written) = tokio::join!(fetch_fut, writer_fut);
    let written = written?;

    Ok(ExportStats {
        written,
        duplicates_dropped: duplicates_dropped.load(Ordering::Relaxed),
        quality_dropped: quality_dropped.load(Ordering::Relaxed),
        fetch_errors: fetch_errors.load(Ordering::Relaxed),
    })
}

async fn fetch_and_build_records(
    store: &dyn ObjectStore,
    key: &str,
    dataset_id: &str,
    tokenizer: Option<&dyn Tokenizer>,
    format: OutputFormat,
) -> KlResult<Vec<ExportRecord>> {
    let bytes = store.get(key).await?;
    let artifacts = kl3m_columnar::deserialize(&bytes)?;

    let mut records = Vec::new();
    for artifact in artifacts {
        for (mime_type, tokens) in artifact.representations {
            let metrics = match (format, tokenizer) {
                (_, Some(t)) => {
                    let text = t.decode(&tokens, true)?;
                    Some(compute_metrics(&text, &tokens))
                }
                _ => None,
            };

            let payload = match format {
                OutputFormat::Tokens => ExportPayload::Tokens { tokens: tokens.clone() },
                OutputFormat::Text => {
                    let text = tokenizer.expect("checked above").decode(&tokens, true)?;
                    ExportPayload::Text { text }
                }
            };

            records.push(ExportRecord {
                identifier: artifact.identifier.clone(),
                dataset: dataset_id.to_string(),
                mime_type,
                payload,
                score: None,
                metrics,
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kl3m_core::ColumnarArtifact;
    use kl3m_store::MemoryObjectStore;
    use std::collections::HashMap;

    struct IdentityTokenizer;
    impl Tokenizer for IdentityTokenizer {
        fn name(&self) -> &str {
            "identity"
        }
        fn encode(&self, text: &str, _add_special_tokens: bool) -> KlResult<Vec<u32>> {
            Ok(text.bytes().map(u32::from).collect())
        }
        fn decode(&self, ids: &[u32], _skip_special_tokens: bool) -> KlResult<String> {
            Ok(ids.iter().map(|&b| b as u8 as char).collect())
        }
        fn id_of_token(&self, _token: &str) -> Option<u32> {
            None
        }
        fn vocab_size(&self) -> usize {
            256
        }
    }

    async fn seed_one(store: &MemoryObjectStore, dataset_id: &str, path: &str, mime_type: &str, tokens: Vec<u32>) {
        let mut reps = HashMap::new();
        reps.insert(mime_type.to_string(), tokens);
        let artifact = ColumnarArtifact {
            identifier: path.to_string(),
            representations: reps,
        };
        let blob = kl3m_columnar::serialize(&[artifact]).unwrap();
        let key = format!("{}/{dataset_id}/{path}", Stage::Parquet.prefix());
        store.put(&key, blob).await.unwrap();
    }

    #[tokio::test]
    async fn export_writes_one_record_per_representation() {
        let mem = MemoryObjectStore::new();
        seed_one(&mem, "contracts", "doc-1.json", "text/plain", vec![104, 105]).await;
        let store: Arc<dyn ObjectStore> = Arc::new(mem);

        let tokenizer = IdentityTokenizer;
        let mut out = Vec::new();
        let stats = export_dataset(
            store,
            "contracts",
            None,
            Some(&tokenizer),
            ExportOptions {
                dedup: false,
                ..Default::default()
            },
            StopFlag::new(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(stats.written, 1);
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn export_drops_exact_duplicates() {
        let mem = MemoryObjectStore::new();
        seed_one(&mem, "contracts", "doc-1.json", "text/plain", vec![1, 2, 3]).await;
        seed_one(&mem, "contracts", "doc-2.json", "text/plain", vec![1, 2, 3]).await;
        let store: Arc<dyn ObjectStore> = Arc::new(mem);

        let tokenizer = IdentityTokenizer;
        let mut out = Vec::new();
        let stats = export_dataset(
            store,
            "contracts",
            None,
            Some(&tokenizer),
            ExportOptions::default(),
            StopFlag::new(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.duplicates_dropped, 1);
    }

    #[test]
    fn stop_flag_starts_unset() {
        let stop = StopFlag::new();
        assert!(!stop.is_stopped());
        stop.stop();
        assert!(stop.is_stopped());
    }
}
