//! Pure key-algebra conversions between the stage namespaces.
//!
//! All functions here are pure and side-effect-free; they fail with
//! `KlError::MalformedKey` if the input does not match the expected shape.
//!

use crate::error::KlError;
use crate::stage::{Stage, StageKey};

/// stage-1 -> stage-2: replace the leading `documents/` with
/// `representations/`; the document path (including its `.json` suffix)
/// is preserved verbatim.
pub fn documents_to_representations(key: &StageKey) -> Result<StageKey, KlError> {
    if key.stage != Stage::Documents {
        return Err(KlError::MalformedKey(format!(
            "expected a documents/ key, got {}",
            key.to_key()
        )));
    }
    Ok(StageKey::new(
        Stage::Representations,
        key.dataset_id.clone(),
        key.document_path.clone(),
    ))
}

/// stage-2 -> stage-3: replace the leading `representations/` with
/// `parquet/`; strip a trailing `.json` suffix from the document path if
/// present.
pub fn representations_to_parquet(key: &StageKey) -> Result<StageKey, KlError> {
    if key.stage != Stage::Representations {
        return Err(KlError::MalformedKey(format!(
            "expected a representations/ key, got {}",
            key.to_key()
        )));
    }
    let document_path = key
        .document_path
        .strip_suffix(".json")
        .unwrap_or(&key.document_path)
        .to_string();
    Ok(StageKey::new(Stage::Parquet, key.dataset_id.clone(), document_path))
}

/// Composition of the two forward conversions
/// `stage3_key(D, p) = representations_to_parquet(documents_to_representations(stage1_key(D, p)))`.
pub fn documents_to_parquet(key: &StageKey) -> Result<StageKey, KlError> {
    representations_to_parquet(&documents_to_representations(key)?)
}

/// The index object key for dataset `dataset_id`, optionally scoped to a
/// sub-prefix `key_prefix`. When `key_prefix` is empty the key is
/// `index/<D>.json.gz`; otherwise interior slashes in the prefix are
/// flattened to `-`, yielding `index/<D>-<P-flattened>.json.gz`.
pub fn index_key(dataset_id: &str, key_prefix: Option<&str>) -> String {
    match key_prefix.filter(|p| !p.is_empty()) {
        None => format!("index/{dataset_id}.json.gz"),
        Some(prefix) => {
            let flattened = prefix.trim_matches('/').replace('/', "-");
            format!("index/{dataset_id}-{flattened}.json.gz")
        }
    }
}

/// Strip a stage's prefix and dataset id off a raw key, returning the bare
/// document path used for missing-set string comparisons across stages
///.
pub fn document_path_of(key: &str, stage: Stage) -> Result<String, KlError> {
    let parsed = StageKey::parse(key)?;
    if parsed.stage != stage {
        return Err(KlError::MalformedKey(format!(
            "key {key} is not in stage {stage}"
        )));
    }
    Ok(parsed.document_path)
}
