//! Masking task handlers, fixed-length windowing, and the quality scorer
//! that together turn tokenized representations into training samples.

pub mod quality;
pub mod special_tokens;
pub mod task;
pub mod windowing;

pub use quality::{adjusted_score, compute_metrics, score_text, DocumentMetrics};
pub use special_tokens::SpecialTokens;
pub use task::{process_clm, process_lmlm, process_mlm, process_pmlm, LmlmState, ProcessedSample, TaskKind};
pub use windowing::{passes_sanity_gate, window_sample, WindowedSample};
