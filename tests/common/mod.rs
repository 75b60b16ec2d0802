//! Scripted camera, stub detector and helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use barcode_live::capture::{
    CameraDevice, CameraProvider, CaptureError, DeviceDescriptor, DevicePosition, DeviceType,
    FrameSender, StreamRequest,
};
use barcode_live::{
    BarcodeDetector, BarcodeObservation, CameraSample, DetectionError, Frame, ImageOrientation,
    PixelFormat, ScanBatch, ScanConfig,
};
use tokio::sync::mpsc;

/// Calls made against a scripted provider and its camera
#[derive(Debug, Default)]
pub struct CameraCalls {
    pub devices: AtomicUsize,
    pub opens: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl CameraCalls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Provider with one camera that plays back a fixed list of samples
pub struct ScriptedProvider {
    pub descriptor: DeviceDescriptor,
    pub formats: Vec<PixelFormat>,
    pub calls: Arc<CameraCalls>,
    script: Mutex<Vec<CameraSample>>,
}

impl ScriptedProvider {
    /// Back wide-angle camera producing NV12 and RGB
    pub fn new(script: Vec<CameraSample>) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                id: "scripted".to_string(),
                name: "Scripted camera".to_string(),
                position: DevicePosition::Back,
                device_type: DeviceType::BuiltInWideAngle,
            },
            formats: vec![PixelFormat::Nv12, PixelFormat::Rgb8],
            calls: Arc::new(CameraCalls::default()),
            script: Mutex::new(script),
        }
    }

    pub fn with_formats(mut self, formats: Vec<PixelFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_position(mut self, position: DevicePosition) -> Self {
        self.descriptor.position = position;
        self
    }
}

impl CameraProvider for ScriptedProvider {
    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.calls.devices.fetch_add(1, Ordering::SeqCst);
        vec![self.descriptor.clone()]
    }

    fn open(&self, id: &str) -> Result<Box<dyn CameraDevice>, CaptureError> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        assert_eq!(id, self.descriptor.id);
        let script = std::mem::take(&mut *self.script.lock().unwrap());
        Ok(Box::new(ScriptedCamera {
            descriptor: self.descriptor.clone(),
            formats: self.formats.clone(),
            calls: Arc::clone(&self.calls),
            script: Some(script),
            thread: None,
        }))
    }
}

/// Camera delivering its script once, from its own thread, on first start
pub struct ScriptedCamera {
    descriptor: DeviceDescriptor,
    formats: Vec<PixelFormat>,
    calls: Arc<CameraCalls>,
    script: Option<Vec<CameraSample>>,
    thread: Option<JoinHandle<()>>,
}

impl CameraDevice for ScriptedCamera {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn supported_pixel_formats(&self) -> &[PixelFormat] {
        &self.formats
    }

    fn start_streaming(
        &mut self,
        _request: StreamRequest,
        sender: FrameSender,
    ) -> Result<(), CaptureError> {
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        let script = self.script.take().unwrap_or_default();
        self.thread = Some(std::thread::spawn(move || {
            for sample in script {
                sender.deliver(sample);
            }
        }));
        Ok(())
    }

    fn stop_streaming(&mut self) {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

/// Detector returning canned observations and recording what it was given
pub struct StubDetector {
    pub calls: AtomicUsize,
    pub orientations: Mutex<Vec<ImageOrientation>>,
    observations: Vec<BarcodeObservation>,
    fail_first: usize,
    delay: Duration,
}

impl StubDetector {
    pub fn new(observations: Vec<BarcodeObservation>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            orientations: Mutex::new(Vec::new()),
            observations,
            fail_first: 0,
            delay: Duration::ZERO,
        }
    }

    /// Fail the first `n` calls
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarcodeDetector for StubDetector {
    async fn detect(
        &self,
        _frame: Frame,
        orientation: ImageOrientation,
    ) -> Result<Vec<BarcodeObservation>, DetectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.orientations.lock().unwrap().push(orientation);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call < self.fail_first {
            return Err(DetectionError::WorkerLost);
        }
        Ok(self.observations.clone())
    }
}

/// Small valid NV12 frame
pub fn nv12_frame() -> Frame {
    Frame::packed(4, 4, PixelFormat::Nv12, vec![128u8; 24])
}

pub fn image_sample(sequence: u64) -> CameraSample {
    CameraSample::with_image(sequence, nv12_frame())
}

/// Config that queues every frame instead of dropping late ones
pub fn lossless_config() -> ScanConfig {
    ScanConfig {
        discard_late_frames: false,
        frame_queue_depth: 16,
        ..ScanConfig::default()
    }
}

/// Sink closure forwarding batches into a channel
pub fn channel_sink() -> (
    impl FnMut(ScanBatch) + Send + 'static,
    mpsc::UnboundedReceiver<ScanBatch>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = move |batch: ScanBatch| {
        let _ = tx.send(batch);
    };
    (sink, rx)
}

pub async fn next_batch(rx: &mut mpsc::UnboundedReceiver<ScanBatch>) -> ScanBatch {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a batch")
        .expect("result channel closed")
}
