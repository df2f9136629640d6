//! Parser dispatch: turns a raw document envelope into zero or more
//! tokenized, filtered [`kl3m_core::ParsedDocument`]s.

pub mod dispatch;
pub mod extract;
pub mod filters;
pub mod hf_tokenizer;
pub mod origin;
pub mod postprocess;
pub mod sniff;
pub mod uuencode;

pub use dispatch::{decode_envelope_content, parse_content, parse_object};
pub use extract::{Extractor, ExtractorSet, PassthroughExtractor};
pub use filters::{apply_filters, default_filters, LineFilter};
pub use hf_tokenizer::HfTokenizer;
pub use postprocess::{deflate, inflate, postprocess_all, postprocess_document};

use kl3m_core::{DocumentEnvelope, KlResult, ParsedDocument, Tokenizer};

/// End-to-end pass over a stage-1 envelope: decode its wire content,
/// dispatch to the appropriate extractor, then filter and tokenize every
/// resulting document. Mirrors `parser.py::parse_object` composed with
/// `postprocess_document` as invoked from the per-object pipeline worker.
pub fn process_envelope(
    object_key: &str,
    envelope: &DocumentEnvelope,
    max_size: Option<usize>,
    extractors: &ExtractorSet,
    tokenizers: &[&dyn Tokenizer],
) -> KlResult<Vec<ParsedDocument>> {
    let raw = decode_envelope_content(&envelope.content)?;
    let docs = parse_object(
        object_key,
        &raw,
        envelope.source.as_deref(),
        &envelope.format,
        Some(&envelope.identifier),
        max_size,
        extractors,
    )?;
    Ok(postprocess_all(docs, &default_filters(), tokenizers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    struct IdentityTokenizer;
    impl Tokenizer for IdentityTokenizer {
        fn name(&self) -> &str {
            "identity"
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

    #[test]
    fn process_envelope_round_trips_a_plain_text_document() {
        let raw = b"hello world".to_vec();
        let compressed = deflate(&raw).unwrap();
        let content_b64 = base64::engine::general_purpose::STANDARD.encode(compressed);

        let envelope = DocumentEnvelope {
            id: "obj-1".into(),
            identifier: "doc-1".into(),
            dataset_id: "ds-1".into(),
            format: "text/plain".into(),
            source: None,
            title: None,
            date: None,
            content: content_b64,
            size: raw.len() as u64,
            blake2b: "unused".into(),
            extra: Default::default(),
        };

        let extractors = ExtractorSet::default();
        let tokenizer = IdentityTokenizer;
        let tokenizers: Vec<&dyn Tokenizer> = vec![&tokenizer];

        let docs = process_envelope(
            "documents/some-dataset/1/a.json",
            &envelope,
            None,
            &extractors,
            &tokenizers,
        )
        .unwrap();

        assert_eq!(docs.len(), 1);
        let repr = &docs[0].representations["text/plain"];
        assert_eq!(repr.content, "hello world");
        assert_eq!(repr.tokens["identity"].len(), 11);
    }

    #[test]
    fn process_envelope_honors_size_cap() {
        let raw = vec![b'a'; 100];
        let compressed = deflate(&raw).unwrap();
        let content_b64 = base64::engine::general_purpose::STANDARD.encode(compressed);

        let envelope = DocumentEnvelope {
            id: "obj-2".into(),
            identifier: "doc-2".into(),
            dataset_id: "ds-1".into(),
            format: "text/plain".into(),
            source: None,
            title: None,
            date: None,
            content: content_b64,
            size: raw.len() as u64,
            blake2b: "unused".into(),
            extra: Default::default(),
        };

        let extractors = ExtractorSet::default();
        let err = process_envelope(
            "documents/some-dataset/1/a.json",
            &envelope,
            Some(10),
            &extractors,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, kl3m_core::KlError::PayloadTooLarge { .. }));
    }
}
