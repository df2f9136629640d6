//! Parquet -> JSONL exporter: producer/consumer fan-out with
//! deduplication, quality gating, and host-resource-driven auto-tuning.

pub mod dedup;
pub mod export;
pub mod record;
pub mod tuning;

pub use dedup::DedupSet;
pub use export::{export_dataset, ExportOptions, ExportStats, OutputFormat, StopFlag};
pub use record::{ExportPayload, ExportRecord};
pub use tuning::ExportConcurrency;
