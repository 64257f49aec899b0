//! Image jobs and their lifecycle.

use serde::{Deserialize, Serialize};
use webpify_core::{ConversionOptions, PixelBuffer};

use crate::error::ConvertError;
use crate::protocol::JobId;

/// Lifecycle state of a job.
///
/// `Pending -> InFlight -> Completed | Failed`, or `Pending -> Failed` when
/// local validation rejects the job. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InFlight,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed or Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InFlight)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::InFlight, JobStatus::Completed)
                | (JobStatus::InFlight, JobStatus::Failed)
        )
    }
}

/// Encoded output attached to a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub job_id: JobId,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One image's conversion request.
#[derive(Debug)]
pub struct ImageJob {
    id: JobId,
    label: String,
    original_size: Option<u64>,
    source: Option<PixelBuffer>,
    source_dimensions: (u32, u32),
    options: ConversionOptions,
    status: JobStatus,
    result: Option<EncodedArtifact>,
    error: Option<ConvertError>,
    delivered: bool,
}

impl ImageJob {
    pub(crate) fn new(
        id: JobId,
        label: String,
        original_size: Option<u64>,
        source: PixelBuffer,
        options: ConversionOptions,
    ) -> Self {
        Self {
            id,
            label,
            original_size,
            source_dimensions: (source.width, source.height),
            source: Some(source),
            options,
            status: JobStatus::Pending,
            result: None,
            error: None,
            delivered: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Display name, usually the source file name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Size of the encoded source file, when known.
    pub fn original_size(&self) -> Option<u64> {
        self.original_size
    }

    /// Source buffer; `None` once it has been handed to the worker.
    pub fn source(&self) -> Option<&PixelBuffer> {
        self.source.as_ref()
    }

    /// Width and height of the source as ingested.
    pub fn source_dimensions(&self) -> (u32, u32) {
        self.source_dimensions
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result(&self) -> Option<&EncodedArtifact> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ConvertError> {
        self.error.as_ref()
    }

    pub(crate) fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub(crate) fn mark_delivered(&mut self) {
        self.delivered = true;
    }

    /// Check the source buffer and options before dispatch.
    pub(crate) fn validate(&self) -> Result<(), ConvertError> {
        let source = self.source.as_ref().ok_or_else(|| {
            ConvertError::Protocol(format!("job {} has no source buffer", self.id))
        })?;
        source.validate()?;
        self.options.validate()?;
        Ok(())
    }

    /// Move to `InFlight`, giving up the source buffer.
    pub(crate) fn start(&mut self) -> Result<PixelBuffer, ConvertError> {
        self.transition(JobStatus::InFlight)?;
        self.source.take().ok_or_else(|| {
            ConvertError::Protocol(format!("job {} has no source buffer", self.id))
        })
    }

    pub(crate) fn complete(&mut self, artifact: EncodedArtifact) -> Result<(), ConvertError> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(artifact);
        Ok(())
    }

    pub(crate) fn fail(&mut self, error: ConvertError) -> Result<(), ConvertError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), ConvertError> {
        if !self.status.can_transition_to(next) {
            return Err(ConvertError::Protocol(format!(
                "job {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}
