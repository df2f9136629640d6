//! Per-format extractor collaborator interface. Archive, PDF,
//! HTML, XML, and Tika-shaped extraction are external, out-of-scope
//! collaborators; this module defines the trait boundary and a
//! deliberately minimal fallback implementation (not the real extractors).

use kl3m_core::ParsedDocument;

/// `(bytes, source?, identifier?) -> [ParsedDocument]`. Implementations may
/// return an empty vec on failure but must never panic or propagate an
/// error out of the dispatch boundary.
pub trait Extractor: Send + Sync {
    fn extract(&self, content: &[u8], source: Option<&str>, identifier: Option<&str>) -> Vec<ParsedDocument>;
}

/// A fallback extractor that wraps content as an opaque `text/plain`
/// representation via lossy UTF-8 decoding. Used as the passthrough
/// default for out-of-scope extractors (archive/pdf/html/xml/tika) when no
/// real collaborator is wired in; a production deployment replaces these
/// with real out-of-process extractors.
pub struct PassthroughExtractor;

impl Extractor for PassthroughExtractor {
    fn extract(&self, content: &[u8], source: Option<&str>, identifier: Option<&str>) -> Vec<ParsedDocument> {
        let text = String::from_utf8_lossy(content).into_owned();
        let mut doc = ParsedDocument::ok(identifier.map(String::from), source.map(String::from));
        doc.representations.insert(
            "text/plain".to_string(),
            kl3m_core::Representation::new(text, "text/plain"),
        );
        vec![doc]
    }
}

/// The set of extractor collaborators the dispatch layer delegates to,
/// one per out-of-scope per-format extractor.
pub struct ExtractorSet {
    pub archive: Box<dyn Extractor>,
    pub pdf: Box<dyn Extractor>,
    pub html: Box<dyn Extractor>,
    pub xml: Box<dyn Extractor>,
    pub eu_oj_xml: Box<dyn Extractor>,
    pub tika: Box<dyn Extractor>,
}

impl Default for ExtractorSet {
    fn default() -> Self {
        Self {
            archive: Box::new(PassthroughExtractor),
            pdf: Box::new(PassthroughExtractor),
            html: Box::new(PassthroughExtractor),
            xml: Box::new(PassthroughExtractor),
            eu_oj_xml: Box::new(PassthroughExtractor),
            tika: Box::new(PassthroughExtractor),
        }
    }
}
