//! Encode/decode a batch of [`ColumnarArtifact`]s to/from a single
//! deflate-wrapped parquet blob. Ported from `kl3m_data/utils/parquet_utils.py`.

use std::sync::Arc;

use bytes::Bytes;
use datafusion::arrow::array::{
    Array, ArrayRef, ListArray, MapArray, RecordBatch, StringArray, UInt32Array,
};
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use datafusion::parquet::arrow::arrow_writer::ArrowWriter;
use datafusion::parquet::file::properties::WriterProperties;

use kl3m_core::{ColumnarArtifact, KlError, KlResult, ParsedDocument, Tokenizer};

use crate::schema::columnar_schema;

/// Media types whose text must be HTML-entity-unescaped before
/// re-tokenization.
const UNESCAPE_MIME_TYPES: &[&str] = &["text/plain", "text/markdown"];

/// Build the single-row columnar artifact for one parsed document,
/// re-tokenizing every representation with the canonical tokenizer rather
/// than reusing whatever tokens stage-2 may have stored.
pub fn build_artifact(doc: &ParsedDocument, tokenizer: &dyn Tokenizer) -> KlResult<ColumnarArtifact> {
    let identifier = doc
        .identifier
        .clone()
        .ok_or_else(|| KlError::MalformedEnvelope("parsed document has no identifier".to_string()))?;

    let mut representations = std::collections::HashMap::new();
    for (mime_type, repr) in &doc.representations {
        let text = if UNESCAPE_MIME_TYPES.contains(&mime_type.as_str()) {
            htmlentity::entity::decode(repr.content.as_bytes()).to_string()
        } else {
            repr.content.clone()
        };
        let ids = tokenizer.encode(&text, true)?;
        representations.insert(mime_type.clone(), ids);
    }

    Ok(ColumnarArtifact {
        identifier,
        representations,
    })
}

/// Encode a batch of artifacts as a single Arrow [`RecordBatch`] against
/// [`columnar_schema`].
pub fn encode_batch(artifacts: &[ColumnarArtifact]) -> KlResult<RecordBatch> {
    let identifiers: ArrayRef = Arc::new(StringArray::from(
        artifacts.iter().map(|a| a.identifier.as_str()).collect::<Vec<_>>(),
    ));

    let representations: ArrayRef = Arc::new(build_representations_map(artifacts)?);

    RecordBatch::try_new(columnar_schema(), vec![identifiers, representations])
        .map_err(|e| KlError::Other(anyhow::anyhow!("failed to build record batch: {e}")))
}

fn build_representations_map(artifacts: &[ColumnarArtifact]) -> KlResult<MapArray> {
    use datafusion::arrow::array::{MapBuilder, StringBuilder, UInt32Builder};
    use datafusion::arrow::array::ListBuilder;

    let mut builder = MapBuilder::new(None, StringBuilder::new(), ListBuilder::new(UInt32Builder::new()));

    for artifact in artifacts {
        for (mime_type, ids) in &artifact.representations {
            builder.keys().append_value(mime_type);
            for id in ids {
                builder.values().values().append_value(*id);
            }
            builder.values().append(true);
        }
        builder
            .append(true)
            .map_err(|e| KlError::Other(anyhow::anyhow!("failed to append map row: {e}")))?;
    }

    Ok(builder.finish())
}

/// Serialize a batch of artifacts as a deflate-wrapped parquet blob.
pub fn serialize(artifacts: &[ColumnarArtifact]) -> KlResult<Vec<u8>> {
    let batch = encode_batch(artifacts)?;

    let mut raw = Vec::new();
    {
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(&mut raw, columnar_schema(), Some(props))
            .map_err(|e| KlError::Other(anyhow::anyhow!("failed to open parquet writer: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| KlError::Other(anyhow::anyhow!("failed to write parquet batch: {e}")))?;
        writer
            .close()
            .map_err(|e| KlError::Other(anyhow::anyhow!("failed to close parquet writer: {e}")))?;
    }

    kl3m_parse::deflate(&raw)
}

/// Decode a deflate-wrapped parquet blob back into `{identifier,
/// representations}` rows.
pub fn deserialize(blob: &[u8]) -> KlResult<Vec<ColumnarArtifact>> {
    let raw = kl3m_parse::inflate(blob)?;
    let bytes = Bytes::from(raw);

    let reader_builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| KlError::MalformedEnvelope(format!("invalid parquet blob: {e}")))?;
    let reader = reader_builder
        .build()
        .map_err(|e| KlError::MalformedEnvelope(format!("failed to build parquet reader: {e}")))?;

    let mut artifacts = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| KlError::MalformedEnvelope(format!("failed to read parquet batch: {e}")))?;
        artifacts.extend(decode_batch(&batch)?);
    }
    Ok(artifacts)
}

fn decode_batch(batch: &RecordBatch) -> KlResult<Vec<ColumnarArtifact>> {
    let identifiers = batch
        .column(0)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| KlError::MalformedEnvelope("identifier column is not a string array".to_string()))?;

    let representations_col = batch
        .column(1)
        .as_any()
        .downcast_ref::<MapArray>()
        .ok_or_else(|| KlError::MalformedEnvelope("representations column is not a map array".to_string()))?;

    let mut artifacts = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let identifier = identifiers.value(row).to_string();
        let entry = representations_col.value(row);

        let keys = entry
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| KlError::MalformedEnvelope("map key column is not a string array".to_string()))?;
        let values = entry
            .column(1)
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| KlError::MalformedEnvelope("map value column is not a list array".to_string()))?;

        let mut representations = std::collections::HashMap::new();
        for i in 0..entry.num_rows() {
            let mime_type = keys.value(i).to_string();
            let tokens = values.value(i);
            let tokens = tokens
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| KlError::MalformedEnvelope("token list is not a uint32 array".to_string()))?
                .values()
                .to_vec();
            representations.insert(mime_type, tokens);
        }

        artifacts.push(ColumnarArtifact {
            identifier,
            representations,
        });
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kl3m_core::Representation;

    struct ReverseTokenizer;
    impl Tokenizer for ReverseTokenizer {
        fn name(&self) -> &str {
            "reverse"
        }
        fn encode(&self, text: &str, _add_special_tokens: bool) -> KlResult<Vec<u32>> {
            Ok(text.bytes().rev().map(u32::from).collect())
        }
        fn decode(&self, ids: &[u32], _skip_special_tokens: bool) -> KlResult<String> {
            Ok(String::from_utf8(ids.iter().rev().map(|&i| i as u8).collect()).unwrap_or_default())
        }
        fn id_of_token(&self, _token: &str) -> Option<u32> {
            None
        }
        fn vocab_size(&self) -> usize {
            256
        }
    }

    #[test]
    fn build_artifact_unescapes_html_entities_for_text_representations() {
        let mut doc = ParsedDocument::ok(Some("doc-1".into()), None);
        doc.representations.insert(
            "text/plain".to_string(),
            Representation::new("Tom &amp; Jerry", "text/plain"),
        );
        let tokenizer = ReverseTokenizer;
        let artifact = build_artifact(&doc, &tokenizer).unwrap();
        let expected: Vec<u32> = "Tom & Jerry".bytes().rev().map(u32::from).collect();
        assert_eq!(artifact.representations["text/plain"], expected);
    }

    #[test]
    fn build_artifact_requires_an_identifier() {
        let doc = ParsedDocument::ok(None, None);
        let tokenizer = ReverseTokenizer;
        assert!(build_artifact(&doc, &tokenizer).is_err());
    }

    #[test]
    fn serialize_then_deserialize_round_trips_a_single_row() {
        let artifact = ColumnarArtifact {
            identifier: "doc-1".to_string(),
            representations: std::collections::HashMap::from([(
                "text/plain".to_string(),
                vec![1u32, 2, 3, 4],
            )]),
        };
        let blob = serialize(std::slice::from_ref(&artifact)).unwrap();
        let decoded = deserialize(&blob).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0], artifact);
    }
}
