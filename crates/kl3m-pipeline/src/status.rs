//! Status operation: per-stage counts and missing-set sizes for a dataset.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;

use kl3m_core::{keys, KlResult, ObjectStore, Stage, StageKey};

/// Per-stage count plus the size of the two forward-transition missing
/// sets, for one dataset (optionally scoped to a sub-prefix).
#[derive(Debug, Clone, Default)]
pub struct DatasetStatus {
    pub documents_count: usize,
    pub representations_count: usize,
    pub parquet_count: usize,
    pub missing_representations: usize,
    pub missing_parquet: usize,
}

/// List every document path present under `stage` for `dataset_id`,
/// scoped to `sub_prefix` if given.
async fn list_document_paths(
    store: &dyn ObjectStore,
    stage: Stage,
    dataset_id: &str,
    sub_prefix: Option<&str>,
) -> KlResult<HashSet<String>> {
    let mut prefix = format!("{}/{dataset_id}/", stage.prefix());
    if let Some(sub) = sub_prefix {
        prefix.push_str(sub.trim_start_matches('/'));
    }

    let mut paths = HashSet::new();
    let mut stream = store.list(&prefix);
    while let Some(key) = stream.next().await {
        let key = key?;
        if let Ok(path) = keys::document_path_of(&key, stage) {
            paths.insert(path);
        }
    }
    Ok(paths)
}

/// Compute the current status for one dataset: per-stage counts, and the
/// size of the documents→representations and representations→parquet
/// missing sets, each via string-set difference over document paths.
pub async fn compute_status(
    store: Arc<dyn ObjectStore>,
    dataset_id: &str,
    sub_prefix: Option<&str>,
) -> KlResult<DatasetStatus> {
    let documents = list_document_paths(store.as_ref(), Stage::Documents, dataset_id, sub_prefix).await?;
    let representations =
        list_document_paths(store.as_ref(), Stage::Representations, dataset_id, sub_prefix).await?;
    let parquet = list_document_paths(store.as_ref(), Stage::Parquet, dataset_id, sub_prefix).await?;

    let missing_representations = documents.difference(&representations).count();
    let missing_parquet = representations.difference(&parquet).count();

    Ok(DatasetStatus {
        documents_count: documents.len(),
        representations_count: representations.len(),
        parquet_count: parquet.len(),
        missing_representations,
        missing_parquet,
    })
}

/// The task list for a forward transition: either the full source set
/// (`clobber=true`) or the missing set (`clobber=false`), returned as
/// fully-qualified source [`StageKey`]s.
pub async fn plan_transition(
    store: Arc<dyn ObjectStore>,
    dataset_id: &str,
    source_stage: Stage,
    target_stage: Stage,
    sub_prefix: Option<&str>,
    clobber: bool,
) -> KlResult<Vec<StageKey>> {
    let source_paths = list_document_paths(store.as_ref(), source_stage, dataset_id, sub_prefix).await?;

    let paths: Vec<String> = if clobber {
        source_paths.into_iter().collect()
    } else {
        let target_paths = list_document_paths(store.as_ref(), target_stage, dataset_id, sub_prefix).await?;
        source_paths.difference(&target_paths).cloned().collect()
    };

    Ok(paths
        .into_iter()
        .map(|path| StageKey::new(source_stage, dataset_id, path))
        .collect())
}
