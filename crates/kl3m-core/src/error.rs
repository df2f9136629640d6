use thiserror::Error;

/// Error taxonomy for the core pipeline, per the error handling design:
/// failures are always local to a single task, and are classified at the
/// boundary rather than modeled as a rich exception hierarchy.
#[derive(Error, Debug)]
pub enum KlError {
    #[error("transient I/O error after retries: {0}")]
    TransientIo(String),

    #[error("payload too large: {size} bytes exceeds cap of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("parser failure: {0}")]
    ParserFailure(String),

    #[error("broker precondition failed: {0}")]
    BrokerPreconditionFailed(#[from] BrokerPreconditionFailed),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerPreconditionFailed {
    #[error("no sample queues available")]
    NoQueuesAvailable,
    #[error("not enough data available")]
    InsufficientData,
}

pub type KlResult<T> = Result<T, KlError>;
