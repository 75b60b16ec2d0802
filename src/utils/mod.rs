//! Image helpers shared by the readers and the camera backends
//!
//! - Luminance extraction (NV12 luma plane, RGB/RGBA weighting)
//! - Otsu thresholding for scanline binarization
//! - Orientation correction of luma images

/// Otsu threshold and row binarization
pub mod binarization;
/// Luma extraction and NV12 packing
pub mod grayscale;
/// EXIF orientation transforms
pub mod orient;
