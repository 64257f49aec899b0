//! webpify worker - off-thread WebP conversion jobs
//!
//! This crate moves encoding off the caller's thread. An [`Orchestrator`]
//! owns the batch of [`ImageJob`]s, validates them and sends their pixel
//! buffers to a [`WorkerRuntime`], a dedicated thread that resamples and
//! encodes one request at a time. Results come back as messages and are
//! matched to jobs by [`JobId`].
//!
//! # Module Structure
//!
//! - `protocol` - request/response messages and the channel ends
//! - `runtime` - the worker thread and its encoder session
//! - `orchestrator` - job collection, dispatch and reconciliation
//! - `job` - job lifecycle state machine
//! - `report` - file size formatting, output names, batch summaries
//!
//! # Usage
//!
//! ```ignore
//! use webpify_worker::{Orchestrator, WorkerConfig, WorkerRuntime};
//! use webpify_core::{ConversionOptions, PixelBuffer};
//!
//! let (_runtime, link) = WorkerRuntime::spawn_webp(&WorkerConfig::default())?;
//! let mut orchestrator = Orchestrator::new(link);
//! orchestrator.wait_ready().await?;
//!
//! let pixels = PixelBuffer::filled(640, 480, [0, 0, 255, 255]);
//! orchestrator.ingest(pixels, ConversionOptions::default());
//! orchestrator.dispatch_pending()?;
//! let summary = orchestrator.run_until_settled().await?;
//! println!("{} converted, {} failed", summary.completed, summary.failed);
//! ```

mod error;
mod job;
mod orchestrator;
mod protocol;
mod report;
mod runtime;

pub use error::ConvertError;
pub use job::{EncodedArtifact, ImageJob, JobStatus};
pub use orchestrator::{ArtifactSink, DispatchSummary, MemorySink, Orchestrator};
pub use protocol::{
    JobId, ProcessRequest, ProcessResult, Request, Response, WorkerEndpoint, WorkerLink,
};
pub use report::{format_file_size, size_ratio_percent, webp_file_name, BatchSummary};
pub use runtime::{WorkerConfig, WorkerRuntime};
