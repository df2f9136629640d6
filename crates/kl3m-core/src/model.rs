//! The data model: document envelope (stage 1), parsed document (stage 2),
//! and columnar artifact (stage 3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stage-1 document envelope. Created by external collaborators (scrapers);
/// never mutated by the core. `content` is the base64(deflate(raw bytes))
/// wire form; the core decodes it once on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    pub id: String,
    pub identifier: String,
    pub dataset_id: String,
    /// Declared media type; may be `application/octet-stream` when unknown.
    pub format: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// base64(deflate(raw-bytes))
    pub content: String,
    pub size: u64,
    pub blake2b: String,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single normalized textual view of a document, tagged with its media
/// type and a map from tokenizer name to the token-id sequence produced by
/// that tokenizer during postprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Representation {
    pub content: String,
    #[serde(default)]
    pub tokens: HashMap<String, Vec<u32>>,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    "text/plain".to_string()
}

impl Representation {
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens: HashMap::new(),
            mime_type: mime_type.into(),
        }
    }
}

/// Stage-2 parsed document. Produced by the Parser Dispatch; immutable
/// thereafter. `representations` is keyed by media type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub original_uri: Option<String>,
    #[serde(default)]
    pub representations: HashMap<String, Representation>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ParsedDocument {
    pub fn ok(identifier: Option<String>, source: Option<String>) -> Self {
        Self {
            source,
            identifier,
            original_uri: None,
            representations: HashMap::new(),
            metadata: HashMap::new(),
            success: true,
            error: None,
        }
    }

    pub fn failed(identifier: Option<String>, source: Option<String>, error: impl Into<String>) -> Self {
        Self {
            source,
            identifier,
            original_uri: None,
            representations: HashMap::new(),
            metadata: HashMap::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// The stage-2 wire envelope: `{"documents": [ParsedDocument, ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepresentationsEnvelope {
    pub documents: Vec<ParsedDocument>,
}

/// Stage-3 columnar artifact: one row per parsed document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnarArtifact {
    pub identifier: String,
    pub representations: HashMap<String, Vec<u32>>,
}

/// Per-dataset index document, written under `index/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub objects: Vec<String>,
    pub metadata: IndexMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub dataset_id: String,
    #[serde(default)]
    pub key_prefix: Option<String>,
    pub count: usize,
    pub created_at: String,
}
