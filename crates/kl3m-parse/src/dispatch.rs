//! Parser dispatch: normalization, media-type sniffing, origin overrides,
//! and per-format extractor dispatch. Ported from
//! `kl3m_data/parsers/generic_object.py::parse_content` and
//! `kl3m_data/parsers/parser.py::parse_object`.

use crate::extract::ExtractorSet;
use crate::origin::{patch_source_metadata, EU_OJ_SOURCE};
use crate::sniff::sniff_media_type;
use crate::uuencode::uudecode;
use kl3m_core::{KlError, KlResult, ParsedDocument, Representation};

/// Strip a leading `<PDF>...</PDF>` wrapper some sources embed around raw
/// PDF bytes.
fn strip_pdf_wrapper(content: &[u8]) -> &[u8] {
    let mut content = content;
    if let Some(rest) = content.strip_prefix(b"<PDF>") {
        content = trim_start(rest);
        if let Some(rest) = content.strip_suffix(b"</PDF>") {
            content = trim_end(rest);
        }
    }
    content
}

fn trim_start(b: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < b.len() && b[i].is_ascii_whitespace() {
        i += 1;
    }
    &b[i..]
}

fn trim_end(b: &[u8]) -> &[u8] {
    let mut i = b.len();
    while i > 0 && b[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    &b[..i]
}

/// Detect and decode a uuencoded payload, either via an explicit
/// `application/uuencode` declared type or by sniffing a `begin NNN` header
/// line. Returns the possibly-updated `(content,
/// format)` pair; on decode failure returns `None` (caller treats this as
/// zero parsed documents, matching the original's `return []` on error).
fn maybe_uudecode(content: Vec<u8>, format: &str) -> Option<(Vec<u8>, Option<String>)> {
    let looks_uuencoded = format == "application/uuencode"
        || (content.starts_with(b"begin")
            && content.len() > 9
            && content[6..9].iter().all(|b| b.is_ascii_digit()));

    if !looks_uuencoded {
        return Some((content, None));
    }

    match uudecode(&content) {
        Ok((name, decoded)) => {
            let guessed = guess_mime_from_filename(&name);
            Some((decoded, guessed))
        }
        Err(_) => None,
    }
}

fn guess_mime_from_filename(name: &str) -> Option<String> {
    let ext = name.rsplit('.').next()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Dispatch normalized content to the appropriate extractor by media type,
/// step 4.
pub fn parse_content(
    content: &[u8],
    source: Option<&str>,
    format: Option<&str>,
    identifier: Option<&str>,
    extractors: &ExtractorSet,
) -> Vec<ParsedDocument> {
    let content = strip_pdf_wrapper(content);

    let declared_format = format.map(str::to_string).unwrap_or_default();
    let (content, format) = match maybe_uudecode(content.to_vec(), &declared_format) {
        Some((content, Some(updated_format))) => (content, updated_format),
        Some((content, None)) => (content, declared_format),
        None => return Vec::new(),
    };

    let format = if format.is_empty() || format == "application/octet-stream" {
        sniff_media_type(&content).map(str::to_string).unwrap_or(format)
    } else {
        format
    };

    match format.as_str() {
        "application/zip" => extractors.archive.extract(&content, source, identifier),
        "application/pdf" => extractors.pdf.extract(&content, source, identifier),
        "text/html" | "application/xhtml+xml" => extractors.html.extract(&content, source, identifier),
        "text/xml" | "application/xml" => {
            if source == Some(EU_OJ_SOURCE) {
                extractors.eu_oj_xml.extract(&content, source, identifier)
            } else {
                extractors.xml.extract(&content, source, identifier)
            }
        }
        "application/json" => extractors.archive_json(&content, source, identifier),
        "text/markdown" => vec![wrap_passthrough(&content, source, identifier, "text/markdown")],
        "text/plain" => {
            let lower_has_html = {
                let lower = content.to_ascii_lowercase();
                lower.windows(5).any(|w| w == b"<html") || lower.windows(9).any(|w| w == b"<!doctype")
            };
            if lower_has_html {
                extractors.html.extract(&content, source, identifier)
            } else {
                vec![wrap_passthrough(&content, source, identifier, "text/plain")]
            }
        }
        _ => extractors.tika.extract(&content, source, identifier),
    }
}

impl ExtractorSet {
    // JSON is simple enough to not need an external collaborator: wrap the
    // raw bytes (re-serialized compactly if valid JSON, else passthrough)
    // as an `application/json` representation.
    fn archive_json(&self, content: &[u8], source: Option<&str>, identifier: Option<&str>) -> Vec<ParsedDocument> {
        let text = match serde_json::from_slice::<serde_json::Value>(content) {
            Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| String::from_utf8_lossy(content).into_owned()),
            Err(_) => String::from_utf8_lossy(content).into_owned(),
        };
        vec![wrap_passthrough(text.as_bytes(), source, identifier, "application/json")]
    }
}

fn wrap_passthrough(content: &[u8], source: Option<&str>, identifier: Option<&str>, mime_type: &str) -> ParsedDocument {
    let mut doc = ParsedDocument::ok(identifier.map(String::from), source.map(String::from));
    doc.representations.insert(
        mime_type.to_string(),
        Representation::new(String::from_utf8_lossy(content).into_owned(), mime_type),
    );
    doc
}

/// Decode the stage-1 wire payload: base64(deflate(raw-bytes)) -> bytes.
pub fn decode_envelope_content(content_b64: &str) -> KlResult<Vec<u8>> {
    use base64::Engine;
    let compressed = base64::engine::general_purpose::STANDARD
        .decode(content_b64)
        .map_err(|e| KlError::MalformedEnvelope(format!("invalid base64: {e}")))?;
    crate::postprocess::inflate(&compressed)
        .map_err(|e| KlError::MalformedEnvelope(format!("invalid deflate stream: {e}")))
}

/// Top-level entry point mirroring `parser.py::parse_object`: applies the
/// origin-override table keyed on the document's object key, then enforces
/// the size cap, then dispatches.
pub fn parse_object(
    object_key: &str,
    content: &[u8],
    source: Option<&str>,
    format: &str,
    identifier: Option<&str>,
    max_size: Option<usize>,
    extractors: &ExtractorSet,
) -> KlResult<Vec<ParsedDocument>> {
    if let Some(max) = max_size {
        if content.len() > max {
            return Err(KlError::PayloadTooLarge {
                size: content.len(),
                max,
            });
        }
    }
    if content.is_empty() {
        return Ok(Vec::new());
    }
    let (source, format) = patch_source_metadata(object_key, source.map(String::from), format.to_string());
    Ok(parse_content(content, source.as_deref(), Some(&format), identifier, extractors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        let extractors = ExtractorSet::default();
        let docs = parse_content(b"hello world", Some("unit-test"), Some("text/plain"), Some("doc-1"), &extractors);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].representations.contains_key("text/plain"));
        assert_eq!(docs[0].representations["text/plain"].content, "hello world");
    }

    #[test]
    fn markdown_passthrough() {
        let extractors = ExtractorSet::default();
        let docs = parse_content(b"# Title", None, Some("text/markdown"), None, &extractors);
        assert_eq!(docs.len(), 1);
        assert!(docs[0].representations.contains_key("text/markdown"));
    }

    #[test]
    fn sniffs_generic_octet_stream_as_html() {
        let extractors = ExtractorSet::default();
        let docs = parse_content(
            b"<html><body>hi</body></html>",
            None,
            Some("application/octet-stream"),
            None,
            &extractors,
        );
        // falls through to the passthrough HTML extractor (stubbed to text/plain)
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn strips_pdf_wrapper_before_dispatch() {
        let extractors = ExtractorSet::default();
        let wrapped = b"<PDF>%PDF-1.4 fake pdf bytes</PDF>";
        let docs = parse_content(wrapped, None, Some("application/pdf"), None, &extractors);
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn size_cap_is_enforced_before_parsing() {
        let extractors = ExtractorSet::default();
        let err = parse_object("documents/other/1/a.json", b"0123456789", None, "text/plain", None, Some(4), &extractors)
            .unwrap_err();
        assert!(matches!(err, KlError::PayloadTooLarge { size: 10, max: 4 }));
    }

    #[test]
    fn empty_content_yields_zero_documents() {
        let extractors = ExtractorSet::default();
        let docs = parse_object("documents/other/1/a.json", b"", None, "text/plain", None, None, &extractors).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn uspto_origin_override_forces_markdown() {
        let extractors = ExtractorSet::default();
        let docs = parse_object(
            "documents/uspto/1/a.json",
            b"# patent text",
            None,
            "text/plain",
            Some("doc-uspto"),
            None,
            &extractors,
        )
        .unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].representations.contains_key("text/markdown"));
    }
}
