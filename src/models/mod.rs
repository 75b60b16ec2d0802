/// Camera frames and samples
pub mod frame;
/// Decoded barcode observations
pub mod observation;
/// 2D points
pub mod point;

pub use frame::{CameraSample, Frame, PixelFormat};
pub use observation::{BarcodeObservation, ScanBatch, Symbology};
pub use point::Point;
