//! Postprocessing: line filtering, empty-representation pruning, and
//! multi-tokenizer encoding. Ported from
//! `kl3m_data/parsers/parser.py::postprocess_document`.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use kl3m_core::{KlError, KlResult, ParsedDocument, Tokenizer};

use crate::filters::{apply_filters, LineFilter};

/// Apply the ordered line-filter chain to every representation of `doc`,
/// dropping any representation that becomes empty after filtering. A
/// document that loses all its representations is itself dropped by the
/// caller (see [`postprocess_document`]).
pub fn filter_representations(doc: &mut ParsedDocument, filters: &[Box<dyn LineFilter>]) {
    doc.representations.retain(|_, repr| {
        let filtered = apply_filters(&repr.content, filters);
        let keep = !filtered.trim().is_empty();
        repr.content = filtered;
        keep
    });
}

/// Encode every surviving representation's content with every configured
/// tokenizer, storing the resulting id sequence under the tokenizer's name.
/// A tokenizer that fails to encode a representation is skipped for that
/// representation rather than failing the whole document.
pub fn tokenize_representations(doc: &mut ParsedDocument, tokenizers: &[&dyn Tokenizer]) {
    for repr in doc.representations.values_mut() {
        for tokenizer in tokenizers {
            match tokenizer.encode(&repr.content, true) {
                Ok(ids) => {
                    repr.tokens.insert(tokenizer.name().to_string(), ids);
                }
                Err(e) => {
                    tracing::warn!(tokenizer = tokenizer.name(), error = %e, "failed to tokenize representation");
                }
            }
        }
    }
}

/// Full postprocessing pass for one parsed document: filter, prune empties,
/// tokenize. Returns `None` if the document has no representations left
/// after filtering (matching the original's silent drop).
pub fn postprocess_document(
    mut doc: ParsedDocument,
    filters: &[Box<dyn LineFilter>],
    tokenizers: &[&dyn Tokenizer],
) -> Option<ParsedDocument> {
    filter_representations(&mut doc, filters);
    if doc.representations.is_empty() {
        return None;
    }
    tokenize_representations(&mut doc, tokenizers);
    Some(doc)
}

/// Postprocess a full dispatch result (one object may parse into several
/// documents, e.g. archive members).
pub fn postprocess_all(
    docs: Vec<ParsedDocument>,
    filters: &[Box<dyn LineFilter>],
    tokenizers: &[&dyn Tokenizer],
) -> Vec<ParsedDocument> {
    docs.into_iter()
        .filter_map(|d| postprocess_document(d, filters, tokenizers))
        .collect()
}

/// Raw DEFLATE decompression, used both for the stage-1 envelope wire
/// format and by the columnar serializer's blob encoding.
pub fn inflate(compressed: &[u8]) -> KlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| KlError::MalformedEnvelope(format!("deflate decode failed: {e}")))?;
    Ok(out)
}

/// Raw DEFLATE compression at the default level.
pub fn deflate(raw: &[u8]) -> KlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| KlError::Other(anyhow::anyhow!("deflate encode failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| KlError::Other(anyhow::anyhow!("deflate encode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::default_filters;
    use kl3m_core::Representation;

    struct UpperTokenizer;
    impl Tokenizer for UpperTokenizer {
        fn name(&self) -> &str {
            "upper"
        }
        fn encode(&self, text: &str, _add_special_tokens: bool) -> KlResult<Vec<u32>> {
            Ok(text.bytes().map(u32::from).collect())
        }
        fn decode(&self, ids: &[u32], _skip_special_tokens: bool) -> KlResult<String> {
            Ok(String::from_utf8(ids.iter().map(|&i| i as u8).collect()).unwrap_or_default())
        }
        fn id_of_token(&self, _token: &str) -> Option<u32> {
            None
        }
        fn vocab_size(&self) -> usize {
            256
        }
    }

    fn doc_with(content: &str, mime: &str) -> ParsedDocument {
        let mut doc = ParsedDocument::ok(Some("id-1".into()), None);
        doc.representations
            .insert(mime.to_string(), Representation::new(content, mime));
        doc
    }

    #[test]
    fn drops_representation_emptied_by_filtering() {
        let doc = doc_with("VerDate Mar<15>2010 16:40 Jun 14, 2010", "text/plain");
        let result = postprocess_document(doc, &default_filters(), &[]);
        assert!(result.is_none());
    }

    #[test]
    fn keeps_and_tokenizes_surviving_representation() {
        let doc = doc_with("hello", "text/plain");
        let tok = UpperTokenizer;
        let tokenizers: Vec<&dyn Tokenizer> = vec![&tok];
        let result = postprocess_document(doc, &default_filters(), &tokenizers).unwrap();
        let repr = &result.representations["text/plain"];
        assert_eq!(repr.content, "hello");
        assert_eq!(repr.tokens["upper"], vec![104, 101, 108, 108, 111]);
    }

    #[test]
    fn deflate_round_trips() {
        let raw = b"the quick brown fox jumps over the lazy dog".to_vec();
        let compressed = deflate(&raw).unwrap();
        let decompressed = inflate(&compressed).unwrap();
        assert_eq!(decompressed, raw);
    }

    #[test]
    fn postprocess_all_preserves_order_and_drops_empties() {
        let docs = vec![
            doc_with("keep me", "text/plain"),
            doc_with("VerDate only", "text/plain"),
        ];
        let result = postprocess_all(docs, &default_filters(), &[]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].representations["text/plain"].content, "keep me");
    }
}
