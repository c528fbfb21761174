//! Error types of the data pipeline.

use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The element shape of a batch item in `(channels, height, width)`.
pub type Shape3 = (usize, usize, usize);

/// Failures of the data pipeline.
///
/// Every variant is fatal. The pipeline never drops a record and retries
/// with the next one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the record store is empty")]
    StoreExhausted,
    #[error("malformed record at offset {offset:?}: {reason}")]
    MalformedRecord { offset: Option<u64>, reason: String },
    #[error("expect 10 landmark values, but found {found}")]
    LandmarkArity { found: usize },
    #[error("unable to decode image payload: {reason}")]
    DecodeError { reason: String },
    #[error("image shape {found:?} does not match the element shape {expect:?} of this run")]
    ShapeMismatch { expect: Shape3, found: Shape3 },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("record store failure: {0}")]
    Store(#[from] heed::Error),
    #[error("failed to open '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Config(#[from] json5::Error),
    #[error("the prefetcher is shut down or stopped producing batches")]
    Disconnected,
    #[error("failed to spawn the prefetching thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("the prefetching thread panicked")]
    WorkerPanicked,
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            offset: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl ToString) -> Self {
        Self::DecodeError {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Attach the logical cursor offset to a malformed record error.
    pub(crate) fn at_offset(self, at: u64) -> Self {
        match self {
            Self::MalformedRecord { offset: None, reason } => Self::MalformedRecord {
                offset: Some(at),
                reason,
            },
            other => other,
        }
    }
}
