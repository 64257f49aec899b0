//! The worker runtime: one dedicated thread that owns the encoder.
//!
//! Requests are handled strictly one at a time in arrival order, so encodes
//! never overlap. The thread exits when the orchestrator drops its
//! [`WorkerLink`] or stops listening for responses.

use std::io;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use webpify_core::{
    resize_for_options, ConversionOptions, EncodeBackend, EncodeError, EncoderAdapter, PixelBuffer,
    WebpBackend,
};

use crate::error::ConvertError;
use crate::protocol::{
    ProcessRequest, ProcessResult, Request, Response, WorkerEndpoint, WorkerLink,
};

/// Worker thread settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name given to the worker thread
    pub thread_name: String,
    /// Stack size in bytes; platform default when unset
    pub stack_size: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "webpify-encoder".to_string(),
            stack_size: None,
        }
    }
}

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct WorkerRuntime {
    handle: JoinHandle<()>,
}

impl WorkerRuntime {
    /// Start a worker whose encoder backend is built by `factory`.
    ///
    /// The factory runs on the worker thread when the `Init` request (sent
    /// here, once) is processed; `InitDone` reports success. Backends
    /// therefore never cross threads and need not be `Send`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<B, F>(
        config: &WorkerConfig,
        factory: F,
    ) -> io::Result<(WorkerRuntime, WorkerLink)>
    where
        B: EncodeBackend + 'static,
        F: FnOnce() -> Result<B, EncodeError> + Send + 'static,
    {
        let (link, endpoint) = WorkerLink::detached();

        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        let handle = builder.spawn(move || Session::new(factory).run(endpoint))?;

        // The endpoint is alive until the thread exits, so this only fails if
        // the thread already died
        if link.send(Request::Init).is_err() {
            warn!("worker exited before Init could be sent");
        }

        debug!(thread = %config.thread_name, "worker spawned");
        Ok((WorkerRuntime { handle }, link))
    }

    /// Start a worker backed by libwebp.
    pub fn spawn_webp(config: &WorkerConfig) -> io::Result<(WorkerRuntime, WorkerLink)> {
        Self::spawn(config, WebpBackend::initialize)
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker thread to exit.
    ///
    /// Blocks until every [`WorkerLink`] for this worker has been dropped.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

/// Worker-side state, owned by the worker thread.
struct Session<B, F> {
    factory: Option<F>,
    adapter: EncoderAdapter<B>,
}

impl<B, F> Session<B, F>
where
    B: EncodeBackend,
    F: FnOnce() -> Result<B, EncodeError>,
{
    fn new(factory: F) -> Self {
        Self {
            factory: Some(factory),
            adapter: EncoderAdapter::new(),
        }
    }

    fn run(mut self, mut endpoint: WorkerEndpoint) {
        while let Some(request) = endpoint.blocking_next() {
            let response = self.handle(request);
            if endpoint.reply(response).is_err() {
                debug!("orchestrator dropped its receiver, stopping worker");
                return;
            }
        }
        debug!("request channel closed, stopping worker");
    }

    fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Init => self.init(),
            Request::Process(request) => self.process(request),
        }
    }

    fn init(&mut self) -> Response {
        let Some(factory) = self.factory.take() else {
            warn!("duplicate Init request ignored");
            return Response::ProtocolError {
                message: "duplicate Init request".to_string(),
            };
        };

        let installed = factory().and_then(|backend| {
            let name = backend.name();
            self.adapter.install(backend)?;
            Ok(name)
        });

        match installed {
            Ok(name) => {
                info!(encoder = name, "worker initialized");
                Response::InitDone {
                    encoder: name.to_string(),
                }
            }
            Err(err) => {
                error!(error = %err, "encoder initialization failed");
                Response::ProcessError {
                    job_id: None,
                    error: err.into(),
                }
            }
        }
    }

    fn process(&mut self, request: ProcessRequest) -> Response {
        let ProcessRequest {
            job_id,
            pixels,
            options,
        } = request;

        debug!(%job_id, width = pixels.width, height = pixels.height, "processing job");
        match self.convert(pixels, &options) {
            Ok(result) => {
                debug!(
                    %job_id,
                    width = result.1,
                    height = result.2,
                    bytes = result.0.len(),
                    "job encoded"
                );
                Response::Processed(ProcessResult {
                    job_id,
                    bytes: result.0,
                    width: result.1,
                    height: result.2,
                })
            }
            Err(error) => {
                warn!(%job_id, %error, "job failed");
                Response::ProcessError {
                    job_id: Some(job_id),
                    error,
                }
            }
        }
    }

    fn convert(
        &mut self,
        pixels: PixelBuffer,
        options: &ConversionOptions,
    ) -> Result<(Vec<u8>, u32, u32), ConvertError> {
        if !self.adapter.is_ready() {
            return Err(ConvertError::NotInitialized);
        }

        let pixels = resize_for_options(pixels, options)?;
        let bytes = self.adapter.encode(&pixels, options.quality)?;
        Ok((bytes, pixels.width, pixels.height))
    }
}
