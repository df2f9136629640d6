//! Core data model, key algebra, error taxonomy, and capability traits
//! shared by every crate in the workspace.

pub mod error;
pub mod keys;
pub mod model;
pub mod stage;
pub mod traits;

pub use error::{BrokerPreconditionFailed, KlError, KlResult};
pub use model::{
    ColumnarArtifact, DatasetIndex, DocumentEnvelope, IndexMetadata, ParsedDocument,
    Representation, RepresentationsEnvelope,
};
pub use stage::{Stage, StageKey};
pub use traits::{ObjectStore, QueueStore, Tokenizer};

/// Canonical tokenizer vocab name, matching the original's
/// `alea-institute/kl3m-004-128k-cased`.
pub const DEFAULT_TOKENIZER_NAME: &str = "alea-institute/kl3m-004-128k-cased";

/// Sentinel label id for non-predicted positions (start/end/pad, and
/// un-masked positions in masked-LM tasks). Matches common cross-entropy
/// "ignore index" convention, and the original's `label_mask_id`.
pub const LABEL_MASK_ID: i64 = -100;
