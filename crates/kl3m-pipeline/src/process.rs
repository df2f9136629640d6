//! Process operation: bounded worker pool driving one forward stage
//! transition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use kl3m_core::{
    keys, ColumnarArtifact, DocumentEnvelope, ObjectStore, ParsedDocument, RepresentationsEnvelope,
    Stage, StageKey, Tokenizer,
};
use kl3m_parse::ExtractorSet;

use crate::status::plan_transition;

/// Options governing one `process` invocation.
pub struct ProcessOptions {
    pub workers: usize,
    pub size_cap: Option<usize>,
    pub clobber: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            workers: 8,
            size_cap: None,
            clobber: false,
        }
    }
}

/// `(processed_count, error_count)`, returned by [`process_stage`].
pub type ProcessResult = (usize, usize);

/// Run the documents→representations or representations→parquet
/// transition for a dataset. A single failing task is logged and counted
/// but never aborts the batch.
pub async fn process_stage(
    store: Arc<dyn ObjectStore>,
    dataset_id: &str,
    source_stage: Stage,
    target_stage: Stage,
    sub_prefix: Option<&str>,
    opts: &ProcessOptions,
    extractors: Arc<ExtractorSet>,
    stage2_tokenizers: Arc<Vec<Arc<dyn Tokenizer>>>,
    canonical_tokenizer: Arc<dyn Tokenizer>,
) -> kl3m_core::KlResult<ProcessResult> {
    let tasks = plan_transition(
        store.clone(),
        dataset_id,
        source_stage,
        target_stage,
        sub_prefix,
        opts.clobber,
    )
    .await?;

    let processed = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    stream::iter(tasks)
        .for_each_concurrent(opts.workers, |source_key| {
            let store = store.clone();
            let extractors = extractors.clone();
            let stage2_tokenizers = stage2_tokenizers.clone();
            let canonical_tokenizer = canonical_tokenizer.clone();
            let processed = processed.clone();
            let errors = errors.clone();
            let size_cap = opts.size_cap;

            async move {
                let result = match (source_stage, target_stage) {
                    (Stage::Documents, Stage::Representations) => {
                        process_documents_to_representations(
                            store.as_ref(),
                            &source_key,
                            size_cap,
                            &extractors,
                            &stage2_tokenizers,
                        )
                        .await
                    }
                    (Stage::Representations, Stage::Parquet) => {
                        process_representations_to_parquet(
                            store.as_ref(),
                            &source_key,
                            canonical_tokenizer.as_ref(),
                        )
                        .await
                    }
                    _ => Err(kl3m_core::KlError::MalformedKey(format!(
                        "unsupported transition {source_stage} -> {target_stage}"
                    ))),
                };

                match result {
                    Ok(()) => {
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        tracing::warn!(key = %source_key.to_key(), error = %err, "stage transition failed");
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        })
        .await;

    Ok((
        processed.load(Ordering::Relaxed),
        errors.load(Ordering::Relaxed),
    ))
}

async fn process_documents_to_representations(
    store: &dyn ObjectStore,
    source_key: &StageKey,
    size_cap: Option<usize>,
    extractors: &ExtractorSet,
    stage2_tokenizers: &[Arc<dyn Tokenizer>],
) -> kl3m_core::KlResult<()> {
    let raw = store.get(&source_key.to_key()).await?;
    let envelope: DocumentEnvelope = serde_json::from_slice(&raw)
        .map_err(|e| kl3m_core::KlError::MalformedEnvelope(format!("invalid envelope JSON: {e}")))?;

    let tokenizer_refs: Vec<&dyn Tokenizer> = stage2_tokenizers.iter().map(|t| t.as_ref()).collect();
    let documents: Vec<ParsedDocument> = kl3m_parse::process_envelope(
        &source_key.to_key(),
        &envelope,
        size_cap,
        extractors,
        &tokenizer_refs,
    )?;

    let target_key = keys::documents_to_representations(source_key)?;
    let body = serde_json::to_vec(&RepresentationsEnvelope { documents })
        .map_err(|e| kl3m_core::KlError::Other(anyhow::anyhow!("failed to serialize representations: {e}")))?;
    store.put(&target_key.to_key(), body).await
}

async fn process_representations_to_parquet(
    store: &dyn ObjectStore,
    source_key: &StageKey,
    canonical_tokenizer: &dyn Tokenizer,
) -> kl3m_core::KlResult<()> {
    let raw = store.get(&source_key.to_key()).await?;
    let envelope: RepresentationsEnvelope = serde_json::from_slice(&raw)
        .map_err(|e| kl3m_core::KlError::MalformedEnvelope(format!("invalid representations JSON: {e}")))?;

    let first = envelope
        .documents
        .first()
        .ok_or_else(|| kl3m_core::KlError::MalformedEnvelope("representations object has no documents".to_string()))?;

    let artifact: ColumnarArtifact = kl3m_columnar::build_artifact(first, canonical_tokenizer)?;
    let blob = kl3m_columnar::serialize(std::slice::from_ref(&artifact))?;

    let target_key = keys::representations_to_parquet(source_key)?;
    store.put(&target_key.to_key(), blob).await
}
