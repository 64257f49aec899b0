//! Messages exchanged between the orchestrator and the worker runtime.
//!
//! Payloads are moved through the channel: once a [`ProcessRequest`] is sent,
//! the sender no longer has the pixel buffer, and the encoded bytes in a
//! [`ProcessResult`] belong to whoever receives it. Both channels are
//! unbounded, so sending never blocks.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use webpify_core::{ConversionOptions, PixelBuffer};

use crate::error::ConvertError;

/// Identifier of one image job. Never reused within an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Orchestrator -> worker.
#[derive(Debug)]
pub enum Request {
    /// Build the encoder. Answered once with `InitDone`.
    Init,
    /// Resample (if requested) and encode one buffer.
    Process(ProcessRequest),
}

/// Work for a single job.
#[derive(Debug)]
pub struct ProcessRequest {
    pub job_id: JobId,
    pub pixels: PixelBuffer,
    pub options: ConversionOptions,
}

/// Worker -> orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The encoder is ready.
    InitDone { encoder: String },
    /// A job was encoded.
    Processed(ProcessResult),
    /// A job, or initialization when `job_id` is `None`, failed.
    ProcessError {
        job_id: Option<JobId>,
        error: ConvertError,
    },
    /// A message violated the protocol and was ignored.
    ProtocolError { message: String },
}

impl Response {
    /// The job this response is about, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Response::Processed(result) => Some(result.job_id),
            Response::ProcessError { job_id, .. } => *job_id,
            Response::InitDone { .. } | Response::ProtocolError { .. } => None,
        }
    }
}

/// Encoded output for a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub job_id: JobId,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// The orchestrator's end of the worker channels.
#[derive(Debug)]
pub struct WorkerLink {
    requests: UnboundedSender<Request>,
    responses: UnboundedReceiver<Response>,
}

impl WorkerLink {
    /// Create a link whose worker end is returned to the caller.
    ///
    /// The worker runtime uses this internally; it is public so a different
    /// runtime (or a test) can speak the protocol directly.
    pub fn detached() -> (WorkerLink, WorkerEndpoint) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        (
            WorkerLink {
                requests: request_tx,
                responses: response_rx,
            },
            WorkerEndpoint {
                requests: request_rx,
                responses: response_tx,
            },
        )
    }

    /// Send a request without waiting. Returns the request if the worker is gone.
    pub fn send(&self, request: Request) -> Result<(), Request> {
        self.requests.send(request).map_err(|e| e.0)
    }

    /// Take a response if one has already arrived.
    pub fn try_recv(&mut self) -> Result<Response, TryRecvError> {
        self.responses.try_recv()
    }

    /// Wait for the next response. `None` once the worker has gone away.
    pub async fn recv(&mut self) -> Option<Response> {
        self.responses.recv().await
    }
}

/// The worker's end of the channels.
#[derive(Debug)]
pub struct WorkerEndpoint {
    requests: UnboundedReceiver<Request>,
    responses: UnboundedSender<Response>,
}

impl WorkerEndpoint {
    /// Block the current thread until a request arrives.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_next(&mut self) -> Option<Request> {
        self.requests.blocking_recv()
    }

    /// Take a request if one is queued.
    pub fn try_next(&mut self) -> Option<Request> {
        self.requests.try_recv().ok()
    }

    /// Send a response. Returns it back if the orchestrator is gone.
    pub fn reply(&self, response: Response) -> Result<(), Response> {
        self.responses.send(response).map_err(|e| e.0)
    }
}
