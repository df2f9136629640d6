//! Build-index operation: list the full stage-2 prefix, serialize the key
//! list plus metadata, and write a real gzip-compressed JSON document under
//! `index/`, matching the `.json.gz` extension these keys carry.

use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures::StreamExt;

use kl3m_core::{keys, DatasetIndex, IndexMetadata, KlError, KlResult, ObjectStore, Stage};

/// List every stage-2 key for `dataset_id` (scoped to `key_prefix` if
/// given), build the index document, gzip it, and write it to the
/// corresponding `index/` key. Returns the number of objects indexed.
pub async fn build_index(
    store: Arc<dyn ObjectStore>,
    dataset_id: &str,
    key_prefix: Option<&str>,
    now: impl Fn() -> String,
) -> KlResult<usize> {
    let mut prefix = format!("{}/{dataset_id}/", Stage::Representations.prefix());
    if let Some(sub) = key_prefix {
        prefix.push_str(sub.trim_start_matches('/'));
    }

    let mut objects = Vec::new();
    let mut stream = store.list(&prefix);
    while let Some(key) = stream.next().await {
        objects.push(key?);
    }
    objects.sort();

    let count = objects.len();
    let index = DatasetIndex {
        objects,
        metadata: IndexMetadata {
            dataset_id: dataset_id.to_string(),
            key_prefix: key_prefix.map(str::to_string),
            count,
            created_at: now(),
        },
    };

    let json = serde_json::to_vec(&index)
        .map_err(|e| KlError::Other(anyhow::anyhow!("failed to serialize dataset index: {e}")))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| KlError::Other(anyhow::anyhow!("failed to gzip dataset index: {e}")))?;
    let gzipped = encoder
        .finish()
        .map_err(|e| KlError::Other(anyhow::anyhow!("failed to gzip dataset index: {e}")))?;

    let target_key = keys::index_key(dataset_id, key_prefix);
    store.put(&target_key, gzipped).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kl3m_store::MemoryObjectStore;
    use std::io::Read;

    #[tokio::test]
    async fn build_index_lists_representations_and_gzips_the_result() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        store
            .put("representations/demo/a.json", b"{}".to_vec())
            .await
            .unwrap();
        store
            .put("representations/demo/b.json", b"{}".to_vec())
            .await
            .unwrap();

        let count = build_index(store.clone(), "demo", None, || "2026-07-31T00:00:00Z".to_string())
            .await
            .unwrap();
        assert_eq!(count, 2);

        let blob = store.get("index/demo.json.gz").await.unwrap();
        let mut decoder = flate2::read::GzDecoder::new(&blob[..]);
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();

        let index: DatasetIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(index.metadata.count, 2);
        assert_eq!(index.objects.len(), 2);
    }

    #[tokio::test]
    async fn build_index_scopes_to_key_prefix() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        store
            .put("representations/demo/a/x.json", b"{}".to_vec())
            .await
            .unwrap();
        store
            .put("representations/demo/b/y.json", b"{}".to_vec())
            .await
            .unwrap();

        let count = build_index(store, "demo", Some("a/"), || "2026-07-31T00:00:00Z".to_string())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
