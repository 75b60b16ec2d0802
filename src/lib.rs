//! barcode_live - live camera barcode scanning
//!
//! A camera session streams frames into a serial processing task, each frame
//! is paired with the current device orientation and run through a barcode
//! detector, and the resulting batch is handed to a [`ResultSink`] from a
//! single delivery task.
//!
//! ```no_run
//! use std::sync::Arc;
//! use barcode_live::{
//!     FrameDetector, ImageSequenceProvider, ScanConfig, ScanPipeline, presentation,
//! };
//!
//! # async fn run() -> Result<(), barcode_live::ScanError> {
//! let pipeline = ScanPipeline::new(
//!     ScanConfig::from_env(),
//!     Arc::new(ImageSequenceProvider::new("frames/")),
//!     Arc::new(FrameDetector::new()),
//! )?;
//! pipeline.configure(|batch| print!("{}", presentation::render(&batch)))?;
//! pipeline.start()?;
//! # pipeline.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Camera sessions, devices and outputs
pub mod capture;
/// Runtime configuration
pub mod config;
/// Barcode detection (QR, EAN-13, EAN-8)
pub mod detector;
/// Host facing errors
pub mod error;
/// Visibility-driven pipeline control
pub mod host;
/// Core data structures (frames, observations, points)
pub mod models;
/// Device and image orientation
pub mod orientation;
/// Camera authorization
pub mod permission;
/// Capture to delivery pipeline
pub mod pipeline;
/// Confidence ranking and text rendering of results
pub mod presentation;
/// Result delivery interface
pub mod sink;
/// Tracing subscriber setup
pub mod telemetry;
/// Image loading and synthetic barcode helpers
pub mod tools;
/// Pixel utilities (luma conversion, thresholds, orientation transforms)
pub mod utils;

pub use capture::image_sequence::ImageSequenceProvider;
pub use capture::{CaptureError, CaptureSession, SessionPreset, SessionState};
pub use config::{DetectorConfig, ScanConfig};
pub use detector::{BarcodeDetector, DetectionError, FrameDetector};
pub use error::ScanError;
pub use host::ScanController;
pub use models::{BarcodeObservation, CameraSample, Frame, PixelFormat, ScanBatch, Symbology};
pub use orientation::{DeviceOrientation, ImageOrientation, resolve};
pub use permission::{AuthorizationStatus, PermissionProvider, StaticPermission, check_permission};
pub use pipeline::{PipelineStats, ScanPipeline};
pub use sink::ResultSink;
