//! The exported JSONL record shape and the two output formats it supports.

use kl3m_tasks::DocumentMetrics;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ExportRecord {
    pub identifier: String,
    pub dataset: String,
    pub mime_type: String,
    #[serde(flatten)]
    pub payload: ExportPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<DocumentMetrics>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ExportPayload {
    Tokens { tokens: Vec<u32> },
    Text { text: String },
}
