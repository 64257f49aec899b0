//! Error taxonomy for the conversion pipeline.

use thiserror::Error;
use webpify_core::{EncodeError, ValidationError};

/// Why a job (or the pipeline) failed.
///
/// Cloneable so it can travel inside a [`Response`](crate::Response) and stay
/// attached to the failed job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Malformed pixel buffer or options; caught before dispatch.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The worker's encoder has not finished initializing.
    #[error("WebP encoder not initialized")]
    NotInitialized,

    /// The encoder failed (including failed initialization).
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// A message broke the request/response protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The worker stopped accepting requests before dispatch.
    #[error("Worker is not accepting requests")]
    WorkerUnavailable,

    /// The worker went away while requests were outstanding.
    #[error("Worker terminated with {in_flight} request(s) in flight")]
    WorkerTerminated { in_flight: usize },

    /// An artifact sink refused a completed artifact.
    #[error("Sink rejected artifact: {0}")]
    Sink(String),
}

impl ConvertError {
    /// Whether this error came from local validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, ConvertError::Validation(_))
    }
}

impl From<EncodeError> for ConvertError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::NotInitialized => ConvertError::NotInitialized,
            EncodeError::InvalidInput(v) => ConvertError::Validation(v),
            other => ConvertError::Encoding(other.to_string()),
        }
    }
}
