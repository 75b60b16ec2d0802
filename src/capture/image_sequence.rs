use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::GenericImageView;
use image::imageops::FilterType;
use tracing::{debug, error, info, warn};

use super::{
    CameraDevice, CameraProvider, CaptureError, Delivery, DeviceDescriptor, DevicePosition,
    DeviceType, FrameSender, StreamRequest,
};
use crate::models::{CameraSample, Frame, PixelFormat};
use crate::tools::image_files;
use crate::utils::grayscale::rgb_to_nv12;

const SUPPORTED_FORMATS: [PixelFormat; 4] = [
    PixelFormat::Nv12,
    PixelFormat::Rgb8,
    PixelFormat::Rgba8,
    PixelFormat::Luma8,
];

/// Provider exposing one virtual camera that replays the images of a
/// directory in name order.
///
/// The camera presents itself as a back-facing wide-angle device so the
/// default device query selects it.
#[derive(Debug, Clone)]
pub struct ImageSequenceProvider {
    root: PathBuf,
    descriptor: DeviceDescriptor,
    interval: Duration,
    looping: bool,
}

impl ImageSequenceProvider {
    /// Replay images from `root` at 15 frames per second, looping
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let descriptor = DeviceDescriptor {
            id: "image-sequence".to_string(),
            name: format!("Image sequence ({})", root.display()),
            position: DevicePosition::Back,
            device_type: DeviceType::BuiltInWideAngle,
        };
        Self {
            root,
            descriptor,
            interval: Duration::from_secs_f32(1.0 / 15.0),
            looping: true,
        }
    }

    /// Set the frame rate; non-positive values are ignored
    pub fn with_fps(mut self, fps: f32) -> Self {
        if fps.is_finite() && fps > 0.0 {
            self.interval = Duration::from_secs_f32(1.0 / fps);
        }
        self
    }

    /// Stop after one pass instead of looping
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Present the camera with a different descriptor
    pub fn with_descriptor(mut self, descriptor: DeviceDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }
}

impl CameraProvider for ImageSequenceProvider {
    fn devices(&self) -> Vec<DeviceDescriptor> {
        if self.root.is_dir() {
            vec![self.descriptor.clone()]
        } else {
            Vec::new()
        }
    }

    fn open(&self, id: &str) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let open_error = |reason: String| CaptureError::DeviceOpen {
            id: id.to_string(),
            reason,
        };
        if id != self.descriptor.id {
            return Err(open_error("unknown device".to_string()));
        }
        let files = image_files(&self.root).map_err(|e| open_error(e.to_string()))?;
        if files.is_empty() {
            return Err(open_error(format!(
                "no images in {}",
                self.root.display()
            )));
        }
        debug!(id, images = files.len(), "image sequence camera opened");
        Ok(Box::new(ImageSequenceCamera {
            descriptor: self.descriptor.clone(),
            files: Arc::new(files),
            interval: self.interval,
            looping: self.looping,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }))
    }
}

/// Virtual camera streaming still images from a dedicated thread
pub struct ImageSequenceCamera {
    descriptor: DeviceDescriptor,
    files: Arc<Vec<PathBuf>>,
    interval: Duration,
    looping: bool,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CameraDevice for ImageSequenceCamera {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn supported_pixel_formats(&self) -> &[PixelFormat] {
        &SUPPORTED_FORMATS
    }

    fn start_streaming(
        &mut self,
        request: StreamRequest,
        sender: FrameSender,
    ) -> Result<(), CaptureError> {
        if self.thread_handle.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let files = Arc::clone(&self.files);
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        let looping = self.looping;
        let handle = thread::Builder::new()
            .name("image-sequence-camera".to_string())
            .spawn(move || run_sequence(&files, request, interval, looping, &running, sender))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::StreamFailed(e.to_string())
            })?;

        info!(
            images = self.files.len(),
            preset = %request.preset,
            format = %request.pixel_format,
            fps = 1.0 / self.interval.as_secs_f32(),
            "image sequence streaming"
        );
        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop_streaming(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!("image sequence thread panicked");
            }
            debug!("image sequence stopped");
        }
    }
}

impl Drop for ImageSequenceCamera {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

fn run_sequence(
    files: &[PathBuf],
    request: StreamRequest,
    interval: Duration,
    looping: bool,
    running: &AtomicBool,
    sender: FrameSender,
) {
    let mut sequence = 0u64;
    while running.load(Ordering::SeqCst) {
        let index = (sequence % files.len() as u64) as usize;
        if !looping && sequence >= files.len() as u64 {
            debug!("image sequence exhausted");
            break;
        }
        let deadline = Instant::now() + interval;

        let path = &files[index];
        let sample = match render(path, request) {
            Ok(frame) => CameraSample::with_image(sequence, frame),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "image unreadable, delivering empty sample");
                CameraSample::empty(sequence)
            }
        };
        if sender.deliver(sample) == Delivery::Closed {
            debug!("frame channel closed, image sequence ending");
            break;
        }
        sequence += 1;

        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
}

/// Decode `path` and convert it to the requested preset and pixel format.
///
/// Images larger than the preset in either dimension are scaled down to fit
/// it, keeping their aspect ratio. Smaller images keep their size.
pub fn render(path: &Path, request: StreamRequest) -> Result<Frame, image::ImageError> {
    let (max_w, max_h) = request.preset.dimensions();
    let img = image::open(path)?;
    let (w, h) = img.dimensions();
    let img = if w > max_w || h > max_h {
        img.resize(max_w, max_h, FilterType::Triangle)
    } else {
        img
    };
    let (width, height) = img.dimensions();

    let frame = match request.pixel_format {
        PixelFormat::Luma8 => Frame::packed(width, height, PixelFormat::Luma8, img.to_luma8().into_raw()),
        PixelFormat::Rgb8 => Frame::packed(width, height, PixelFormat::Rgb8, img.to_rgb8().into_raw()),
        PixelFormat::Rgba8 => Frame::packed(width, height, PixelFormat::Rgba8, img.to_rgba8().into_raw()),
        PixelFormat::Nv12 => {
            let rgb = img.to_rgb8();
            let (data, stride) = rgb_to_nv12(rgb.as_raw(), width as usize, height as usize);
            Frame {
                width,
                height,
                stride,
                format: PixelFormat::Nv12,
                data: data.into(),
            }
        }
    };
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SessionPreset, frame_channel};
    use crate::tools::synthesize_ean;

    fn write_sequence(dir: &Path) {
        synthesize_ean("5901234123457", 2, 40)
            .unwrap()
            .save(dir.join("a.png"))
            .unwrap();
        synthesize_ean("96385074", 2, 40)
            .unwrap()
            .save(dir.join("b.png"))
            .unwrap();
        std::fs::write(dir.join("c.png"), b"not a png").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();
    }

    #[test]
    fn test_provider_lists_directory_camera() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ImageSequenceProvider::new(dir.path());
        assert_eq!(provider.devices().len(), 1);

        let missing = ImageSequenceProvider::new(dir.path().join("missing"));
        assert!(missing.devices().is_empty());
    }

    #[test]
    fn test_open_requires_images() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ImageSequenceProvider::new(dir.path());
        assert!(matches!(
            provider.open("image-sequence"),
            Err(CaptureError::DeviceOpen { .. })
        ));
        write_sequence(dir.path());
        assert!(provider.open("image-sequence").is_ok());
        assert!(provider.open("other").is_err());
    }

    #[test]
    fn test_render_nv12_fits_preset() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path());
        let request = StreamRequest {
            preset: SessionPreset::Vga640x480,
            pixel_format: PixelFormat::Nv12,
        };
        let frame = render(&dir.path().join("a.png"), request).unwrap();
        assert!(frame.width <= 640 && frame.height <= 480);
        assert_eq!(frame.format, PixelFormat::Nv12);
        assert!(frame.is_well_formed());
    }

    #[test]
    fn test_render_scales_down_when_one_side_overflows() {
        let dir = tempfile::tempdir().unwrap();
        let tall = dir.path().join("tall.png");
        image::GrayImage::from_pixel(640, 2000, image::Luma([255u8]))
            .save(&tall)
            .unwrap();
        let request = StreamRequest {
            preset: SessionPreset::Vga640x480,
            pixel_format: PixelFormat::Luma8,
        };
        let frame = render(&tall, request).unwrap();
        assert_eq!(frame.height, 480);
        assert!(frame.width <= 640);

        let small = dir.path().join("small.png");
        image::GrayImage::from_pixel(100, 50, image::Luma([0u8]))
            .save(&small)
            .unwrap();
        let frame = render(&small, request).unwrap();
        assert_eq!((frame.width, frame.height), (100, 50));
    }

    #[test]
    fn test_streams_every_image_once_without_looping() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path());
        let provider = ImageSequenceProvider::new(dir.path())
            .with_fps(200.0)
            .with_looping(false);
        let mut camera = provider.open("image-sequence").unwrap();

        let (sender, mut rx) = frame_channel(false, 8);
        let request = StreamRequest {
            preset: SessionPreset::Vga640x480,
            pixel_format: PixelFormat::Luma8,
        };
        camera.start_streaming(request, sender).unwrap();

        let mut samples = Vec::new();
        while let Some(sample) = rx.blocking_recv() {
            samples.push(sample);
        }
        camera.stop_streaming();

        assert_eq!(samples.len(), 3);
        assert!(samples[0].image_buffer().is_some());
        assert!(samples[1].image_buffer().is_some());
        // the corrupt file becomes a sample without image
        assert!(samples[2].image_buffer().is_none());
        let sequences: Vec<u64> = samples.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }
}
