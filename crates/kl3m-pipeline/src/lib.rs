//! Dataset Pipeline: per-dataset status, forward stage
//! processing, and index building, all driven against an [`ObjectStore`].

pub mod index;
pub mod process;
pub mod status;

pub use index::build_index;
pub use process::{process_stage, ProcessOptions, ProcessResult};
pub use status::{compute_status, plan_transition, DatasetStatus};

use std::sync::Arc;

use kl3m_core::{KlResult, ObjectStore, Stage, Tokenizer};
use kl3m_parse::ExtractorSet;

/// The per-dataset orchestrator: bundles the collaborators every operation
/// needs (object store, extractor set, stage-2 tokenizer roster, and the
/// canonical stage-3 tokenizer) so callers don't have to thread them
/// through every call.
pub struct DatasetPipeline {
    store: Arc<dyn ObjectStore>,
    extractors: Arc<ExtractorSet>,
    stage2_tokenizers: Arc<Vec<Arc<dyn Tokenizer>>>,
    canonical_tokenizer: Arc<dyn Tokenizer>,
}

impl DatasetPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        extractors: Arc<ExtractorSet>,
        stage2_tokenizers: Vec<Arc<dyn Tokenizer>>,
        canonical_tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            store,
            extractors,
            stage2_tokenizers: Arc::new(stage2_tokenizers),
            canonical_tokenizer,
        }
    }

    pub async fn status(&self, dataset_id: &str, sub_prefix: Option<&str>) -> KlResult<DatasetStatus> {
        compute_status(self.store.clone(), dataset_id, sub_prefix).await
    }

    pub async fn process(
        &self,
        dataset_id: &str,
        source_stage: Stage,
        target_stage: Stage,
        sub_prefix: Option<&str>,
        opts: &ProcessOptions,
    ) -> KlResult<ProcessResult> {
        process_stage(
            self.store.clone(),
            dataset_id,
            source_stage,
            target_stage,
            sub_prefix,
            opts,
            self.extractors.clone(),
            self.stage2_tokenizers.clone(),
            self.canonical_tokenizer.clone(),
        )
        .await
    }

    /// Run both forward transitions in sequence, then rebuild the index if
    /// either transition made progress.
    pub async fn process_all(
        &self,
        dataset_id: &str,
        sub_prefix: Option<&str>,
        opts: &ProcessOptions,
        now: impl Fn() -> String,
    ) -> KlResult<(ProcessResult, ProcessResult)> {
        let to_representations = self
            .process(dataset_id, Stage::Documents, Stage::Representations, sub_prefix, opts)
            .await?;
        let to_parquet = self
            .process(
                dataset_id,
                Stage::Representations,
                Stage::Parquet,
                sub_prefix,
                opts,
            )
            .await?;

        if to_representations.0 > 0 || to_parquet.0 > 0 {
            build_index(self.store.clone(), dataset_id, sub_prefix, now).await?;
        }

        Ok((to_representations, to_parquet))
    }

    pub async fn build_index(
        &self,
        dataset_id: &str,
        sub_prefix: Option<&str>,
        now: impl Fn() -> String,
    ) -> KlResult<usize> {
        build_index(self.store.clone(), dataset_id, sub_prefix, now).await
    }
}
