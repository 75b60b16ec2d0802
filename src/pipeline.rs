//! Capture to detection to delivery.
//!
//! ```text
//! camera thread ──frame channel──▶ processing task ──▶ detector (rayon)
//!  (late frames dropped)            one sample at a time      │
//!                                                             ▼
//!                 ResultSink ◀── delivery task ◀──result channel
//! ```
//!
//! The processing task handles samples serially in arrival order. The
//! delivery task is the only caller of the sink, so batches never reach it
//! concurrently. Stopping the session halts the camera but does not cancel a
//! detection already running; its batch is still delivered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::capture::device::discover;
use crate::capture::{
    CameraProvider, CaptureError, CaptureSession, SessionState, VideoDataOutput, frame_channel,
};
use crate::config::ScanConfig;
use crate::detector::BarcodeDetector;
use crate::error::ScanError;
use crate::models::{CameraSample, ScanBatch};
use crate::orientation::{FixedOrientation, OrientationSource, resolve};
use crate::sink::ResultSink;

/// Snapshot of pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Samples taken off the frame channel
    pub samples_received: u64,
    /// Samples discarded by the output because processing was busy
    pub samples_dropped_late: u64,
    /// Samples that carried no image
    pub samples_without_image: u64,
    /// Frames handed to the detector
    pub detections_dispatched: u64,
    /// Detector calls that failed
    pub detection_failures: u64,
    /// Batches handed to the sink
    pub batches_delivered: u64,
}

#[derive(Debug, Default)]
struct Counters {
    samples_received: AtomicU64,
    samples_without_image: AtomicU64,
    detections_dispatched: AtomicU64,
    detection_failures: AtomicU64,
    batches_delivered: AtomicU64,
    dropped_late: OnceLock<Arc<AtomicU64>>,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_dropped_late: self
                .dropped_late
                .get()
                .map(|c| c.load(Ordering::Relaxed))
                .unwrap_or(0),
            samples_without_image: self.samples_without_image.load(Ordering::Relaxed),
            detections_dispatched: self.detections_dispatched.load(Ordering::Relaxed),
            detection_failures: self.detection_failures.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
        }
    }
}

/// A camera session wired to a detector and a result sink.
///
/// Lifecycle calls take `&self` and may come from any thread; share the
/// pipeline behind an `Arc` when several contexts need it. Blocking calls
/// (`configure`, `start`, `stop`) touch the camera and should not be made
/// from a current-thread runtime while the camera is streaming.
pub struct ScanPipeline {
    config: ScanConfig,
    provider: Arc<dyn CameraProvider>,
    detector: Arc<dyn BarcodeDetector>,
    orientation: Arc<dyn OrientationSource>,
    session: Mutex<CaptureSession>,
    runtime: Handle,
    counters: Arc<Counters>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScanPipeline {
    /// Build a pipeline on the current tokio runtime.
    ///
    /// Frames are assumed upright until [`with_orientation`](Self::with_orientation)
    /// supplies a device orientation source.
    pub fn new(
        config: ScanConfig,
        provider: Arc<dyn CameraProvider>,
        detector: Arc<dyn BarcodeDetector>,
    ) -> Result<Self, ScanError> {
        let runtime = Handle::try_current().map_err(|_| ScanError::NoRuntime)?;
        Ok(Self {
            config,
            provider,
            detector,
            orientation: Arc::new(FixedOrientation::default()),
            session: Mutex::new(CaptureSession::new()),
            runtime,
            counters: Arc::new(Counters::default()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Read the device orientation from `source` for every frame
    pub fn with_orientation(mut self, source: Arc<dyn OrientationSource>) -> Self {
        self.orientation = source;
        self
    }

    /// Configuration the pipeline was built with
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.session().state()
    }

    /// Counters so far
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Select the camera, wire input and output, and route results to `sink`.
    ///
    /// On failure the session keeps its previous topology and cannot start.
    /// Calling this on an already configured pipeline does nothing.
    pub fn configure<S: ResultSink>(&self, sink: S) -> Result<(), ScanError> {
        let mut session = self.session();
        match session.state() {
            SessionState::Idle | SessionState::Running => {
                debug!("configure ignored, session already configured");
                return Ok(());
            }
            SessionState::TornDown => return Err(ScanError::Configuration(CaptureError::TornDown)),
            SessionState::Uninitialized | SessionState::Configuring => {}
        }

        let descriptor = discover(self.provider.as_ref(), &self.config.device).map_err(|e| {
            warn!(error = %e, "no suitable camera");
            ScanError::DeviceUnavailable(e)
        })?;
        let device = self.provider.open(&descriptor.id).map_err(|e| {
            warn!(error = %e, "camera could not be opened");
            ScanError::DeviceUnavailable(e)
        })?;

        let (sender, frames) =
            frame_channel(self.config.discard_late_frames, self.config.frame_queue_depth);
        let drop_counter = sender.drop_counter();
        let output = VideoDataOutput::new(self.config.pixel_format, sender);

        let mut bracket = session.begin_configuration().map_err(ScanError::Configuration)?;
        bracket.set_preset(self.config.preset);
        if let Err(e) = bracket.add_input(device) {
            warn!(error = %e, "could not add video device input to the session");
            return Err(ScanError::Configuration(e));
        }
        if let Err(e) = bracket.add_output(output) {
            warn!(error = %e, "could not add video data output to the session");
            return Err(ScanError::Configuration(e));
        }
        let state = bracket.commit();
        drop(session);

        let _ = self.counters.dropped_late.set(drop_counter);
        self.spawn_tasks(frames, Box::new(sink));
        info!(
            device = %descriptor.name,
            preset = %self.config.preset,
            format = %self.config.pixel_format,
            discard_late = self.config.discard_late_frames,
            state = %state,
            "scan pipeline configured"
        );
        Ok(())
    }

    /// Begin scanning. Already running is not an error.
    pub fn start(&self) -> Result<(), ScanError> {
        self.session().start().map_err(|e| {
            warn!(error = %e, "capture session did not start");
            ScanError::Start(e)
        })
    }

    /// Stop scanning. Stopping a stopped pipeline is not an error.
    pub fn stop(&self) {
        self.session().stop();
    }

    /// Tear the session down and wait for queued results to be delivered.
    pub async fn shutdown(&self) {
        self.session().teardown();
        let tasks: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "pipeline task ended abnormally");
            }
        }
        debug!(stats = ?self.stats(), "scan pipeline shut down");
    }

    fn session(&self) -> MutexGuard<'_, CaptureSession> {
        match self.session.lock() {
            Ok(session) => session,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn spawn_tasks(&self, frames: mpsc::Receiver<CameraSample>, sink: Box<dyn ResultSink>) {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let processing = self.runtime.spawn(process_samples(
            frames,
            Arc::clone(&self.detector),
            Arc::clone(&self.orientation),
            results_tx,
            Arc::clone(&self.counters),
        ));
        let delivery = self.runtime.spawn(deliver_batches(
            results_rx,
            sink,
            Arc::clone(&self.counters),
        ));
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.extend([processing, delivery]),
            Err(poisoned) => poisoned.into_inner().extend([processing, delivery]),
        }
    }
}

impl Drop for ScanPipeline {
    fn drop(&mut self) {
        self.session().teardown();
    }
}

async fn process_samples(
    mut frames: mpsc::Receiver<CameraSample>,
    detector: Arc<dyn BarcodeDetector>,
    orientation: Arc<dyn OrientationSource>,
    results: mpsc::UnboundedSender<ScanBatch>,
    counters: Arc<Counters>,
) {
    while let Some(sample) = frames.recv().await {
        Counters::bump(&counters.samples_received);
        let sequence = sample.sequence;
        let captured_at = sample.captured_at;

        let Some(frame) = sample.into_image_buffer() else {
            Counters::bump(&counters.samples_without_image);
            trace!(sequence, "sample has no image buffer, skipped");
            continue;
        };

        let image_orientation = resolve(orientation.current());
        Counters::bump(&counters.detections_dispatched);
        match detector.detect(frame, image_orientation).await {
            Ok(observations) => {
                trace!(sequence, found = observations.len(), "frame detected");
                let batch = ScanBatch {
                    frame_sequence: sequence,
                    captured_at,
                    orientation: image_orientation,
                    observations,
                };
                if results.send(batch).is_err() {
                    debug!("delivery task gone, processing stops");
                    break;
                }
            }
            Err(err) => {
                Counters::bump(&counters.detection_failures);
                warn!(sequence, error = %err, "barcode detection failed, frame skipped");
            }
        }
    }
    debug!("frame channel closed, processing task done");
}

async fn deliver_batches(
    mut results: mpsc::UnboundedReceiver<ScanBatch>,
    mut sink: Box<dyn ResultSink>,
    counters: Arc<Counters>,
) {
    while let Some(batch) = results.recv().await {
        sink.on_barcodes_scanned(batch);
        Counters::bump(&counters.batches_delivered);
    }
    debug!("result channel closed, delivery task done");
}
