//! Caller-side job collection: validation, dispatch and reconciliation.
//!
//! The orchestrator never waits on the worker when dispatching. Responses are
//! matched to jobs strictly by [`JobId`], so the order in which they arrive
//! does not matter. Jobs whose responses never arrive (the worker died) stay
//! `InFlight`; there is no cancellation.

use std::collections::BTreeMap;

use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};
use webpify_core::{ConversionOptions, PixelBuffer};

use crate::error::ConvertError;
use crate::job::{EncodedArtifact, ImageJob, JobStatus};
use crate::protocol::{JobId, ProcessRequest, ProcessResult, Request, Response, WorkerLink};
use crate::report::BatchSummary;

/// Outcome of one `dispatch_pending` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Jobs sent to the worker.
    pub dispatched: usize,
    /// Jobs failed locally (validation or unavailable worker).
    pub rejected: usize,
}

/// Receives completed artifacts, e.g. to save or upload them.
pub trait ArtifactSink {
    fn accept(&mut self, job: &ImageJob, artifact: &EncodedArtifact) -> Result<(), ConvertError>;
}

/// Sink that keeps artifacts in memory under their `.webp` file names.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub files: Vec<(String, Vec<u8>)>,
}

impl ArtifactSink for MemorySink {
    fn accept(&mut self, job: &ImageJob, artifact: &EncodedArtifact) -> Result<(), ConvertError> {
        let name = crate::report::webp_file_name(job.label());
        self.files.push((name, artifact.bytes.clone()));
        Ok(())
    }
}

/// Job collection bound to one worker.
#[derive(Debug)]
pub struct Orchestrator {
    link: WorkerLink,
    jobs: BTreeMap<JobId, ImageJob>,
    next_id: u64,
    encoder: Option<String>,
    init_error: Option<ConvertError>,
    worker_gone: bool,
}

impl Orchestrator {
    /// Create an orchestrator talking to the worker behind `link`.
    pub fn new(link: WorkerLink) -> Self {
        Self {
            link,
            jobs: BTreeMap::new(),
            next_id: 0,
            encoder: None,
            init_error: None,
            worker_gone: false,
        }
    }

    /// Whether `InitDone` has been observed.
    pub fn is_ready(&self) -> bool {
        self.encoder.is_some()
    }

    /// Encoder name reported by the worker.
    pub fn encoder_name(&self) -> Option<&str> {
        self.encoder.as_deref()
    }

    /// Add a job for `source`. The job starts `Pending`.
    pub fn ingest(&mut self, source: PixelBuffer, options: ConversionOptions) -> JobId {
        let label = format!("image-{}", self.next_id);
        self.ingest_labeled(label, None, source, options)
    }

    /// Add a job with a display label (usually a file name) and source file size.
    pub fn ingest_labeled(
        &mut self,
        label: impl Into<String>,
        original_size: Option<u64>,
        source: PixelBuffer,
        options: ConversionOptions,
    ) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;

        let job = ImageJob::new(id, label.into(), original_size, source, options);
        debug!(job_id = %id, label = job.label(), "job ingested");
        self.jobs.insert(id, job);
        id
    }

    pub fn job(&self, id: JobId) -> Option<&ImageJob> {
        self.jobs.get(&id)
    }

    /// All jobs in ingestion order.
    pub fn jobs(&self) -> impl Iterator<Item = &ImageJob> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs not yet Completed or Failed.
    pub fn outstanding(&self) -> usize {
        self.jobs.values().filter(|j| !j.status().is_terminal()).count()
    }

    /// Jobs waiting on a worker response.
    pub fn in_flight(&self) -> usize {
        self.count(JobStatus::InFlight)
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_jobs(self.jobs.values())
    }

    /// Drop every job. Late responses for them are ignored.
    pub fn clear(&mut self) {
        debug!(jobs = self.jobs.len(), "batch cleared");
        self.jobs.clear();
    }

    /// Validate and send every `Pending` job.
    ///
    /// Invalid jobs fail locally without reaching the worker; the rest of the
    /// batch is still dispatched.
    ///
    /// # Errors
    ///
    /// Returns `ConvertError::NotInitialized` before `InitDone` has been
    /// observed. No job is touched in that case, so the call can be retried.
    pub fn dispatch_pending(&mut self) -> Result<DispatchSummary, ConvertError> {
        if !self.is_ready() {
            return Err(ConvertError::NotInitialized);
        }

        let mut summary = DispatchSummary::default();
        let pending = self
            .jobs
            .values_mut()
            .filter(|job| job.status() == JobStatus::Pending);

        for job in pending {
            if let Err(err) = job.validate() {
                warn!(job_id = %job.id(), error = %err, "job rejected before dispatch");
                job.fail(err)?;
                summary.rejected += 1;
                continue;
            }

            let request = ProcessRequest {
                job_id: job.id(),
                pixels: job.start()?,
                options: job.options().clone(),
            };
            if self.link.send(Request::Process(request)).is_err() {
                error!(job_id = %job.id(), "worker unavailable");
                job.fail(ConvertError::WorkerUnavailable)?;
                summary.rejected += 1;
                continue;
            }
            summary.dispatched += 1;
        }

        info!(
            dispatched = summary.dispatched,
            rejected = summary.rejected,
            "batch dispatched"
        );
        Ok(summary)
    }

    /// Apply one worker response.
    ///
    /// Returns the id of the job that changed state, if any. Responses that
    /// name an unknown job or a job that is not in flight are logged as
    /// protocol errors and otherwise ignored.
    pub fn handle_response(&mut self, response: Response) -> Option<JobId> {
        match response {
            Response::InitDone { encoder } => {
                if self.encoder.is_some() {
                    warn!(encoder = %encoder, "protocol error: duplicate InitDone");
                } else {
                    info!(encoder = %encoder, "worker ready");
                    self.encoder = Some(encoder);
                }
                None
            }
            Response::Processed(ProcessResult {
                job_id,
                bytes,
                width,
                height,
            }) => {
                let artifact = EncodedArtifact {
                    job_id,
                    bytes,
                    width,
                    height,
                };
                self.settle(job_id, |job| job.complete(artifact))
            }
            Response::ProcessError {
                job_id: Some(job_id),
                error,
            } => self.settle(job_id, |job| job.fail(error)),
            Response::ProcessError {
                job_id: None,
                error,
            } => {
                error!(%error, "worker reported an error without a job");
                self.init_error = Some(error);
                None
            }
            Response::ProtocolError { message } => {
                warn!(detail = %message, "worker reported a protocol error");
                None
            }
        }
    }

    /// Apply every response that has already arrived, without waiting.
    ///
    /// Returns the number of responses handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.link.try_recv() {
                Ok(response) => {
                    self.handle_response(response);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_worker_gone();
                    break;
                }
            }
        }
        handled
    }

    /// Wait for the next response and apply it.
    ///
    /// Returns the id of the job that changed state, if any.
    ///
    /// # Errors
    ///
    /// Returns `WorkerTerminated` once the worker has gone away.
    pub async fn next_event(&mut self) -> Result<Option<JobId>, ConvertError> {
        match self.link.recv().await {
            Some(response) => Ok(self.handle_response(response)),
            None => {
                self.mark_worker_gone();
                Err(ConvertError::WorkerTerminated {
                    in_flight: self.in_flight(),
                })
            }
        }
    }

    /// Wait until the worker reports `InitDone`.
    ///
    /// # Errors
    ///
    /// Returns the worker's initialization error, or `WorkerTerminated`.
    pub async fn wait_ready(&mut self) -> Result<(), ConvertError> {
        while !self.is_ready() {
            if let Some(err) = &self.init_error {
                return Err(err.clone());
            }
            self.next_event().await?;
        }
        Ok(())
    }

    /// Wait until no job is in flight.
    ///
    /// # Errors
    ///
    /// Returns `WorkerTerminated` if the worker goes away first; its jobs are
    /// left `InFlight`.
    pub async fn run_until_settled(&mut self) -> Result<BatchSummary, ConvertError> {
        while self.in_flight() > 0 {
            self.next_event().await?;
        }
        Ok(self.summary())
    }

    /// Whether the worker's channel has been observed closed.
    pub fn worker_gone(&self) -> bool {
        self.worker_gone
    }

    /// Hand every completed, not yet delivered artifact to `sink`.
    ///
    /// Stops at the first sink error; already delivered artifacts stay
    /// delivered. Returns the number delivered by this call.
    pub fn drain_completed_into<S: ArtifactSink>(
        &mut self,
        sink: &mut S,
    ) -> Result<usize, ConvertError> {
        let mut delivered = 0;
        for job in self.jobs.values_mut() {
            if job.is_delivered() {
                continue;
            }
            let Some(artifact) = job.result() else {
                continue;
            };
            sink.accept(job, artifact)?;
            job.mark_delivered();
            delivered += 1;
        }
        Ok(delivered)
    }

    fn settle<F>(&mut self, job_id: JobId, apply: F) -> Option<JobId>
    where
        F: FnOnce(&mut ImageJob) -> Result<(), ConvertError>,
    {
        let Some(job) = self.jobs.get_mut(&job_id) else {
            warn!(%job_id, "protocol error: response for unknown job");
            return None;
        };
        if job.status() != JobStatus::InFlight {
            warn!(
                %job_id,
                status = ?job.status(),
                "protocol error: response for job not in flight"
            );
            return None;
        }
        match apply(&mut *job) {
            Ok(()) => {
                debug!(%job_id, status = ?job.status(), "job settled");
                Some(job_id)
            }
            Err(err) => {
                warn!(%job_id, error = %err, "protocol error");
                None
            }
        }
    }

    fn count(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status() == status).count()
    }

    fn mark_worker_gone(&mut self) {
        if !self.worker_gone {
            warn!(in_flight = self.in_flight(), "worker channel closed");
            self.worker_gone = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WorkerEndpoint;
    use crate::runtime::{WorkerConfig, WorkerRuntime};
    use std::time::Duration;
    use tokio::time::timeout;
    use webpify_core::encode::{BufferId, EncodeBackend, EncodeError, ResultId};
    use webpify_core::ValidationError;

    const WAIT: Duration = Duration::from_secs(30);

    fn blue(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::filled(width, height, [0, 0, 255, 255])
    }

    fn malformed() -> PixelBuffer {
        PixelBuffer {
            width: 4,
            height: 4,
            bytes: vec![0u8; 4 * 4 * 4 - 1],
        }
    }

    /// Orchestrator wired to a hand-driven endpoint, already ready.
    fn scripted() -> (Orchestrator, WorkerEndpoint) {
        let (link, endpoint) = WorkerLink::detached();
        let mut orch = Orchestrator::new(link);
        orch.handle_response(Response::InitDone {
            encoder: "scripted".to_string(),
        });
        (orch, endpoint)
    }

    fn processed(job_id: JobId) -> Response {
        Response::Processed(ProcessResult {
            job_id,
            bytes: vec![0x52, 0x49, 0x46, 0x46],
            width: 1,
            height: 1,
        })
    }

    fn drain_requests(endpoint: &mut WorkerEndpoint) -> Vec<ProcessRequest> {
        let mut requests = Vec::new();
        while let Some(request) = endpoint.try_next() {
            match request {
                Request::Process(req) => requests.push(req),
                Request::Init => panic!("orchestrator should not send Init"),
            }
        }
        requests
    }

    #[tokio::test]
    async fn test_batch_with_one_malformed_buffer() {
        let (_runtime, link) = WorkerRuntime::spawn_webp(&WorkerConfig::default()).unwrap();
        let mut orch = Orchestrator::new(link);
        timeout(WAIT, orch.wait_ready()).await.unwrap().unwrap();
        assert_eq!(orch.encoder_name(), Some("libwebp"));

        let options = ConversionOptions::with_quality(75);
        let first = orch.ingest(malformed(), options.clone());
        let second = orch.ingest(blue(8, 8), options.clone());
        let third = orch.ingest(blue(16, 4), options);

        let dispatch = orch.dispatch_pending().unwrap();
        assert_eq!(
            dispatch,
            DispatchSummary {
                dispatched: 2,
                rejected: 1
            }
        );

        // Validation failure is immediate and local
        let job = orch.job(first).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(matches!(
            job.error(),
            Some(ConvertError::Validation(ValidationError::LengthMismatch { .. }))
        ));

        let summary = timeout(WAIT, orch.run_until_settled()).await.unwrap().unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(orch.outstanding(), 0);

        for id in [second, third] {
            let job = orch.job(id).unwrap();
            assert_eq!(job.status(), JobStatus::Completed);
            let artifact = job.result().unwrap();
            assert_eq!(artifact.job_id, id);
            assert!(!artifact.bytes.is_empty());
        }
        assert_eq!(orch.job(third).unwrap().result().unwrap().width, 16);
    }

    #[tokio::test]
    async fn test_dispatch_before_ready_is_retryable() {
        let (_runtime, link) = WorkerRuntime::spawn_webp(&WorkerConfig::default()).unwrap();
        let mut orch = Orchestrator::new(link);
        let id = orch.ingest(blue(4, 4), ConversionOptions::default());

        // InitDone has not been observed yet: nothing is touched
        assert_eq!(orch.dispatch_pending(), Err(ConvertError::NotInitialized));
        assert_eq!(orch.job(id).unwrap().status(), JobStatus::Pending);
        assert!(orch.job(id).unwrap().source().is_some());

        timeout(WAIT, orch.wait_ready()).await.unwrap().unwrap();
        assert_eq!(orch.dispatch_pending().unwrap().dispatched, 1);
        timeout(WAIT, orch.run_until_settled()).await.unwrap().unwrap();
        assert_eq!(orch.job(id).unwrap().status(), JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_keep_aspect_artifact_dimensions() {
        let (_runtime, link) = WorkerRuntime::spawn_webp(&WorkerConfig::default()).unwrap();
        let mut orch = Orchestrator::new(link);
        timeout(WAIT, orch.wait_ready()).await.unwrap().unwrap();

        let id = orch.ingest(blue(800, 400), ConversionOptions::resized(60, 200, 200, true));
        orch.dispatch_pending().unwrap();
        timeout(WAIT, orch.run_until_settled()).await.unwrap().unwrap();

        let artifact = orch.job(id).unwrap().result().unwrap();
        assert_eq!((artifact.width, artifact.height), (200, 100));
        assert_eq!(orch.job(id).unwrap().source_dimensions(), (800, 400));
    }

    #[tokio::test]
    async fn test_failed_init_surfaces_from_wait_ready() {
        let (_runtime, link) = WorkerRuntime::spawn(&WorkerConfig::default(), || {
            let err = EncodeError::InitFailed("missing codec".to_string());
            Err::<webpify_core::WebpBackend, _>(err)
        })
        .unwrap();
        let mut orch = Orchestrator::new(link);

        let err = timeout(WAIT, orch.wait_ready()).await.unwrap().unwrap_err();
        assert!(matches!(err, ConvertError::Encoding(_)));
        assert!(!orch.is_ready());
    }

    /// Backend whose encode panics, taking the worker thread down.
    #[derive(Default)]
    struct PanickingBackend {
        input: Vec<u8>,
    }

    impl EncodeBackend for PanickingBackend {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn create_buffer(&mut self, width: u32, height: u32) -> Result<BufferId, EncodeError> {
            self.input = vec![0u8; width as usize * height as usize * 4];
            Ok(BufferId(1))
        }
        fn input_mut(&mut self, _: BufferId) -> Option<&mut [u8]> {
            Some(&mut self.input)
        }
        fn destroy_buffer(&mut self, _: BufferId) {
            self.input.clear();
        }
        fn encode(&mut self, _: BufferId, _: u32, _: u32, _: u8) -> Result<(), EncodeError> {
            panic!("encoder crashed")
        }
        fn result(&self) -> Option<(ResultId, usize)> {
            None
        }
        fn result_bytes(&self, _: ResultId) -> Option<&[u8]> {
            None
        }
        fn free_result(&mut self, _: ResultId) {}
    }

    #[tokio::test]
    async fn test_worker_death_leaves_jobs_in_flight() {
        let (link, mut endpoint) = WorkerLink::detached();
        let mut orch = Orchestrator::new(link);
        endpoint
            .reply(Response::InitDone {
                encoder: "doomed".to_string(),
            })
            .unwrap();
        orch.poll();
        assert!(orch.is_ready());

        let id = orch.ingest(blue(2, 2), ConversionOptions::default());
        orch.dispatch_pending().unwrap();
        assert_eq!(drain_requests(&mut endpoint).len(), 1);

        // Worker disappears without answering
        drop(endpoint);

        let err = timeout(WAIT, orch.run_until_settled()).await.unwrap().unwrap_err();
        assert_eq!(err, ConvertError::WorkerTerminated { in_flight: 1 });
        assert!(orch.worker_gone());
        assert_eq!(orch.job(id).unwrap().status(), JobStatus::InFlight);
        assert_eq!(orch.outstanding(), 1);
    }

    #[tokio::test]
    async fn test_worker_panic_is_observed_as_termination() {
        let (runtime, link) =
            WorkerRuntime::spawn(&WorkerConfig::default(), || Ok(PanickingBackend::default()))
                .unwrap();
        let mut orch = Orchestrator::new(link);
        timeout(WAIT, orch.wait_ready()).await.unwrap().unwrap();

        let id = orch.ingest(blue(1, 1), ConversionOptions::default());
        orch.dispatch_pending().unwrap();

        let err = timeout(WAIT, orch.run_until_settled()).await.unwrap().unwrap_err();
        assert_eq!(err, ConvertError::WorkerTerminated { in_flight: 1 });
        assert_eq!(orch.job(id).unwrap().status(), JobStatus::InFlight);

        drop(orch);
        assert!(runtime.join().is_err());
    }

    #[test]
    fn test_dispatch_to_closed_worker_fails_jobs() {
        let (link, endpoint) = WorkerLink::detached();
        let mut orch = Orchestrator::new(link);
        orch.handle_response(Response::InitDone {
            encoder: "gone".to_string(),
        });
        drop(endpoint);

        let id = orch.ingest(blue(2, 2), ConversionOptions::default());
        let summary = orch.dispatch_pending().unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(
            orch.job(id).unwrap().error(),
            Some(&ConvertError::WorkerUnavailable)
        );
    }

    #[test]
    fn test_invalid_options_fail_locally() {
        let (mut orch, mut endpoint) = scripted();
        let id = orch.ingest(blue(4, 4), ConversionOptions::resized(80, 0, 100, false));
        let bad_quality = orch.ingest(blue(4, 4), ConversionOptions::with_quality(101));

        let summary = orch.dispatch_pending().unwrap();
        assert_eq!(summary.rejected, 2);
        assert!(drain_requests(&mut endpoint).is_empty());
        assert!(orch.job(id).unwrap().error().unwrap().is_validation());
        assert!(orch.job(bad_quality).unwrap().error().unwrap().is_validation());
    }

    #[test]
    fn test_huge_declared_dimensions_fail_only_that_job() {
        let (mut orch, mut endpoint) = scripted();
        let huge = orch.ingest(
            PixelBuffer {
                width: u32::MAX,
                height: u32::MAX,
                bytes: vec![0u8; 16],
            },
            ConversionOptions::default(),
        );
        let fine = orch.ingest(blue(1, 1), ConversionOptions::default());

        let summary = orch.dispatch_pending().unwrap();
        assert_eq!(
            summary,
            DispatchSummary {
                dispatched: 1,
                rejected: 1
            }
        );

        let job = orch.job(huge).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(
            job.error(),
            Some(&ConvertError::Validation(ValidationError::DimensionsOverflow {
                width: u32::MAX,
                height: u32::MAX,
            }))
        );
        assert_eq!(orch.job(fine).unwrap().status(), JobStatus::InFlight);

        let requests = drain_requests(&mut endpoint);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].job_id, fine);
    }

    #[test]
    fn test_process_error_fails_job_with_message() {
        let (mut orch, mut endpoint) = scripted();
        let id = orch.ingest(blue(2, 2), ConversionOptions::default());
        orch.dispatch_pending().unwrap();
        assert_eq!(drain_requests(&mut endpoint).len(), 1);

        let changed = orch.handle_response(Response::ProcessError {
            job_id: Some(id),
            error: ConvertError::Encoding("bad bitstream".to_string()),
        });
        assert_eq!(changed, Some(id));
        let job = orch.job(id).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(
            job.error().unwrap().to_string(),
            "Encoding failed: bad bitstream"
        );
    }

    #[test]
    fn test_stray_responses_are_ignored() {
        let (mut orch, mut endpoint) = scripted();
        let id = orch.ingest(blue(2, 2), ConversionOptions::default());
        let pending = orch.ingest(blue(2, 2), ConversionOptions::default());

        // Response for a job that was never dispatched
        assert_eq!(orch.handle_response(processed(pending)), None);
        assert_eq!(orch.job(pending).unwrap().status(), JobStatus::Pending);

        orch.dispatch_pending().unwrap();
        drain_requests(&mut endpoint);

        // Unknown id
        assert_eq!(orch.handle_response(processed(JobId(999))), None);

        // Duplicate response after completion: terminal state holds
        assert_eq!(orch.handle_response(processed(id)), Some(id));
        assert_eq!(
            orch.handle_response(Response::ProcessError {
                job_id: Some(id),
                error: ConvertError::NotInitialized,
            }),
            None
        );
        assert_eq!(orch.job(id).unwrap().status(), JobStatus::Completed);
        assert!(orch.job(id).unwrap().error().is_none());

        // Protocol errors and duplicate InitDone leave state alone
        orch.handle_response(Response::ProtocolError {
            message: "huh".to_string(),
        });
        orch.handle_response(Response::InitDone {
            encoder: "other".to_string(),
        });
        assert_eq!(orch.encoder_name(), Some("scripted"));
    }

    #[test]
    fn test_dispatch_is_idempotent_for_in_flight_jobs() {
        let (mut orch, mut endpoint) = scripted();
        orch.ingest(blue(2, 2), ConversionOptions::default());

        assert_eq!(orch.dispatch_pending().unwrap().dispatched, 1);
        assert_eq!(orch.dispatch_pending().unwrap().dispatched, 0);
        assert_eq!(drain_requests(&mut endpoint).len(), 1);
        assert_eq!(orch.in_flight(), 1);
    }

    #[test]
    fn test_source_moves_into_request() {
        let (mut orch, mut endpoint) = scripted();
        let pixels = PixelBuffer::filled(3, 1, [1, 2, 3, 4]);
        let id = orch.ingest(pixels.clone(), ConversionOptions::with_quality(42));
        orch.dispatch_pending().unwrap();

        assert!(orch.job(id).unwrap().source().is_none());
        let requests = drain_requests(&mut endpoint);
        assert_eq!(requests[0].job_id, id);
        assert_eq!(requests[0].pixels, pixels);
        assert_eq!(requests[0].options.quality, 42);
    }

    #[test]
    fn test_clear_drops_jobs_and_ignores_late_results() {
        let (mut orch, mut endpoint) = scripted();
        let id = orch.ingest(blue(2, 2), ConversionOptions::default());
        orch.dispatch_pending().unwrap();
        drain_requests(&mut endpoint);

        orch.clear();
        assert!(orch.is_empty());
        assert_eq!(orch.handle_response(processed(id)), None);

        // Ids are not reused after a clear
        let next = orch.ingest(blue(2, 2), ConversionOptions::default());
        assert_ne!(next, id);
    }

    #[test]
    fn test_drain_completed_into_sink_once() {
        let (mut orch, mut endpoint) = scripted();
        let options = ConversionOptions::default();
        let id = orch.ingest_labeled("holiday.jpg", Some(2048), blue(2, 2), options.clone());
        let failed = orch.ingest_labeled("broken.png", None, malformed(), options);
        orch.dispatch_pending().unwrap();
        drain_requests(&mut endpoint);
        orch.handle_response(processed(id));

        let mut sink = MemorySink::default();
        assert_eq!(orch.drain_completed_into(&mut sink).unwrap(), 1);
        assert_eq!(orch.drain_completed_into(&mut sink).unwrap(), 0);
        assert_eq!(sink.files.len(), 1);
        assert_eq!(sink.files[0].0, "holiday.webp");
        assert_eq!(orch.job(id).unwrap().original_size(), Some(2048));
        assert_eq!(orch.job(failed).unwrap().status(), JobStatus::Failed);
    }

    struct RejectingSink;

    impl ArtifactSink for RejectingSink {
        fn accept(&mut self, _: &ImageJob, _: &EncodedArtifact) -> Result<(), ConvertError> {
            Err(ConvertError::Sink("disk full".to_string()))
        }
    }

    #[test]
    fn test_sink_error_keeps_artifact_undelivered() {
        let (mut orch, mut endpoint) = scripted();
        let id = orch.ingest(blue(2, 2), ConversionOptions::default());
        orch.dispatch_pending().unwrap();
        drain_requests(&mut endpoint);
        orch.handle_response(processed(id));

        assert_eq!(
            orch.drain_completed_into(&mut RejectingSink),
            Err(ConvertError::Sink("disk full".to_string()))
        );
        let mut sink = MemorySink::default();
        assert_eq!(orch.drain_completed_into(&mut sink).unwrap(), 1);
    }

    #[test]
    fn test_outstanding_counts_pending_and_in_flight() {
        let (mut orch, mut endpoint) = scripted();
        orch.ingest(blue(2, 2), ConversionOptions::default());
        assert_eq!(orch.outstanding(), 1);
        orch.dispatch_pending().unwrap();
        orch.ingest(blue(2, 2), ConversionOptions::default());

        let summary = orch.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.in_flight, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(orch.outstanding(), 2);
        drain_requests(&mut endpoint);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
