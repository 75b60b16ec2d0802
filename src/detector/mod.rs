//! Barcode detection over camera frames
//!
//! [`BarcodeDetector`] is the asynchronous seam the pipeline talks to.
//! [`FrameDetector`] is the stock implementation: it extracts luminance,
//! uprights the image for the frame's orientation and runs every enabled
//! [`SymbologyReader`] on the rayon pool.

/// EAN-13 / EAN-8 scanline reader
pub mod ean;
/// QR reader
pub mod qr;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use image::GrayImage;
use rayon::prelude::*;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::trace;

use crate::config::DetectorConfig;
use crate::models::{BarcodeObservation, Frame, PixelFormat, Symbology};
use crate::orientation::ImageOrientation;
use crate::utils::grayscale::frame_to_luma;
use crate::utils::orient::upright;

pub use ean::EanReader;
pub use qr::QrReader;

/// Symbologies the built-in readers can decode
pub const SUPPORTED_SYMBOLOGIES: [Symbology; 3] = [Symbology::Qr, Symbology::Ean13, Symbology::Ean8];

/// Why a detection pass could not run
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The buffer does not hold the pixels its geometry declares
    #[error(
        "malformed {format} frame {width}x{height} (stride {stride}): need {} bytes, got {actual}",
        describe_len(.required)
    )]
    MalformedFrame {
        /// Pixel layout
        format: PixelFormat,
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
        /// Declared stride
        stride: usize,
        /// Bytes the geometry requires, `None` when it overflows `usize`
        required: Option<usize>,
        /// Bytes present
        actual: usize,
    },

    /// The detector has no reader to run
    #[error("no symbology reader enabled")]
    NoReaders,

    /// A reader panicked while processing the frame
    #[error("symbology reader panicked: {0}")]
    ReaderPanicked(String),

    /// The worker went away without reporting a result
    #[error("detection worker dropped before completing")]
    WorkerLost,
}

/// Asynchronous barcode detection over one frame.
///
/// Implementations keep no per-frame state and must tolerate overlapping
/// calls. The order of the returned observations carries no meaning.
#[async_trait]
pub trait BarcodeDetector: Send + Sync {
    /// Detect and decode every barcode visible in `frame`
    async fn detect(
        &self,
        frame: Frame,
        orientation: ImageOrientation,
    ) -> Result<Vec<BarcodeObservation>, DetectionError>;
}

#[async_trait]
impl<D: BarcodeDetector + ?Sized> BarcodeDetector for Arc<D> {
    async fn detect(
        &self,
        frame: Frame,
        orientation: ImageOrientation,
    ) -> Result<Vec<BarcodeObservation>, DetectionError> {
        (**self).detect(frame, orientation).await
    }
}

/// A decoder for one family of symbologies working on an upright luma image
pub trait SymbologyReader: Send + Sync {
    /// Symbologies this reader can report
    fn symbologies(&self) -> &'static [Symbology];

    /// Decode everything this reader recognizes in `image`
    fn read(&self, image: &GrayImage) -> Vec<BarcodeObservation>;
}

/// Detector running a set of [`SymbologyReader`]s on the rayon pool
#[derive(Clone)]
pub struct FrameDetector {
    readers: Arc<Vec<Box<dyn SymbologyReader>>>,
}

impl FrameDetector {
    /// Detector with the QR and EAN readers at default settings
    pub fn new() -> Self {
        Self::from_config(&DetectorConfig::default())
    }

    /// Detector with the readers needed for the configured symbologies
    pub fn from_config(config: &DetectorConfig) -> Self {
        let mut readers: Vec<Box<dyn SymbologyReader>> = Vec::new();
        if config.symbologies.contains(&Symbology::Qr) {
            readers.push(Box::new(QrReader::new()));
        }
        let ean: Vec<Symbology> = config
            .symbologies
            .iter()
            .copied()
            .filter(|s| matches!(s, Symbology::Ean13 | Symbology::Ean8))
            .collect();
        if !ean.is_empty() {
            readers.push(Box::new(
                EanReader::new(config.ean_scanlines).with_symbologies(&ean),
            ));
        }
        Self {
            readers: Arc::new(readers),
        }
    }

    /// Detector running exactly the given readers
    pub fn with_readers(readers: Vec<Box<dyn SymbologyReader>>) -> Self {
        Self {
            readers: Arc::new(readers),
        }
    }

    /// Symbologies the configured readers can report
    pub fn symbologies(&self) -> Vec<Symbology> {
        self.readers
            .iter()
            .flat_map(|r| r.symbologies().iter().copied())
            .collect()
    }

    /// Run detection on the calling thread.
    ///
    /// Readers still fan out over the rayon pool.
    pub fn detect_blocking(
        &self,
        frame: &Frame,
        orientation: ImageOrientation,
    ) -> Result<Vec<BarcodeObservation>, DetectionError> {
        validate(frame)?;
        if self.readers.is_empty() {
            return Err(DetectionError::NoReaders);
        }
        Ok(run_readers(&self.readers, frame, orientation))
    }
}

impl Default for FrameDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BarcodeDetector for FrameDetector {
    async fn detect(
        &self,
        frame: Frame,
        orientation: ImageOrientation,
    ) -> Result<Vec<BarcodeObservation>, DetectionError> {
        validate(&frame)?;
        if self.readers.is_empty() {
            return Err(DetectionError::NoReaders);
        }

        let readers = Arc::clone(&self.readers);
        let (tx, rx) = oneshot::channel();
        rayon::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                run_readers(&readers, &frame, orientation)
            }))
            .map_err(|panic| DetectionError::ReaderPanicked(panic_message(&panic)));
            // The receiver is gone if the pipeline was torn down mid-detection.
            let _ = tx.send(result);
        });

        rx.await.map_err(|_| DetectionError::WorkerLost)?
    }
}

fn describe_len(len: &Option<usize>) -> String {
    match len {
        Some(len) => len.to_string(),
        None => "more than usize::MAX".to_string(),
    }
}

fn validate(frame: &Frame) -> Result<(), DetectionError> {
    if frame.is_well_formed() {
        return Ok(());
    }
    Err(DetectionError::MalformedFrame {
        format: frame.format,
        width: frame.width,
        height: frame.height,
        stride: frame.stride,
        required: frame.required_len(),
        actual: frame.data.len(),
    })
}

fn run_readers(
    readers: &[Box<dyn SymbologyReader>],
    frame: &Frame,
    orientation: ImageOrientation,
) -> Vec<BarcodeObservation> {
    let luma = frame_to_luma(frame);
    let image = upright(&luma, orientation);
    let observations: Vec<BarcodeObservation> = readers
        .par_iter()
        .flat_map_iter(|reader| reader.read(&image))
        .collect();
    trace!(
        width = image.width(),
        height = image.height(),
        orientation = orientation.exif(),
        found = observations.len(),
        "frame scanned"
    );
    observations
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::synthesize_ean;

    struct Panicking;

    impl SymbologyReader for Panicking {
        fn symbologies(&self) -> &'static [Symbology] {
            &[Symbology::Code128]
        }

        fn read(&self, _image: &GrayImage) -> Vec<BarcodeObservation> {
            panic!("reader blew up")
        }
    }

    fn ean_frame(code: &str) -> Frame {
        let image = synthesize_ean(code, 3, 40).unwrap();
        let (w, h) = image.dimensions();
        Frame::packed(w, h, PixelFormat::Luma8, image.into_raw())
    }

    #[tokio::test]
    async fn test_detects_ean13_frame() {
        let detector = FrameDetector::new();
        let found = detector
            .detect(ean_frame("5901234123457"), ImageOrientation::Up)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload(), Some("5901234123457"));
        assert_eq!(found[0].symbology(), Symbology::Ean13);
        assert!(found[0].confidence() > 0.9);
    }

    #[tokio::test]
    async fn test_blank_frame_yields_empty_set() {
        let detector = FrameDetector::new();
        let frame = Frame::packed(64, 48, PixelFormat::Luma8, vec![200u8; 64 * 48]);
        let found = detector.detect(frame, ImageOrientation::Up).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dispatch_error() {
        let detector = FrameDetector::new();
        let frame = Frame::packed(64, 48, PixelFormat::Rgb8, vec![0u8; 10]);
        let err = detector
            .detect(frame, ImageOrientation::Up)
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::MalformedFrame { actual: 10, .. }));
    }

    #[tokio::test]
    async fn test_overflowing_geometry_is_dispatch_error() {
        let detector = FrameDetector::new();
        let frame = Frame {
            width: 1,
            height: 2,
            stride: usize::MAX,
            format: PixelFormat::Luma8,
            data: vec![0u8; 4].into(),
        };
        let err = detector
            .detect(frame, ImageOrientation::Up)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DetectionError::MalformedFrame { required: None, .. }
        ));
        assert!(err.to_string().contains("more than usize::MAX"));
    }

    #[tokio::test]
    async fn test_reader_panic_is_contained() {
        let detector = FrameDetector::with_readers(vec![Box::new(Panicking)]);
        let frame = Frame::packed(8, 8, PixelFormat::Luma8, vec![0u8; 64]);
        let err = detector
            .detect(frame, ImageOrientation::Up)
            .await
            .unwrap_err();
        match err {
            DetectionError::ReaderPanicked(msg) => assert!(msg.contains("blew up")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_readers() {
        let detector = FrameDetector::with_readers(Vec::new());
        let frame = Frame::packed(8, 8, PixelFormat::Luma8, vec![0u8; 64]);
        assert!(matches!(
            detector.detect_blocking(&frame, ImageOrientation::Up),
            Err(DetectionError::NoReaders)
        ));
    }

    #[test]
    fn test_config_selects_readers() {
        let config = DetectorConfig {
            symbologies: vec![Symbology::Ean8],
            ..DetectorConfig::default()
        };
        let detector = FrameDetector::from_config(&config);
        assert_eq!(detector.symbologies(), vec![Symbology::Ean8]);
    }

    #[test]
    fn test_upside_down_frame_is_uprighted() {
        // Barcode rendered rotated 180°, tagged as `Down`.
        let image = synthesize_ean("96385074", 3, 30).unwrap();
        let rotated = image::imageops::rotate180(&image);
        let (w, h) = rotated.dimensions();
        let frame = Frame::packed(w, h, PixelFormat::Luma8, rotated.into_raw());
        let found = FrameDetector::new()
            .detect_blocking(&frame, ImageOrientation::Down)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload(), Some("96385074"));
        assert_eq!(found[0].symbology(), Symbology::Ean8);
    }
}
