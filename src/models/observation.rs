use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use super::Point;
use crate::orientation::ImageOrientation;

/// Barcode encoding standard reported with a decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    /// QR Code (Model 2)
    Qr,
    /// Micro QR
    MicroQr,
    /// Aztec
    Aztec,
    /// Data Matrix
    DataMatrix,
    /// PDF417
    Pdf417,
    /// Code 39
    Code39,
    /// Code 93
    Code93,
    /// Code 128
    Code128,
    /// EAN-8
    Ean8,
    /// EAN-13 (UPC-A is reported as EAN-13 with a leading zero)
    Ean13,
    /// UPC-E
    Upce,
    /// Interleaved 2 of 5
    I2of5,
    /// ITF-14
    Itf14,
}

impl Symbology {
    /// Every symbology this crate knows about
    pub const ALL: [Symbology; 13] = [
        Symbology::Qr,
        Symbology::MicroQr,
        Symbology::Aztec,
        Symbology::DataMatrix,
        Symbology::Pdf417,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Code128,
        Symbology::Ean8,
        Symbology::Ean13,
        Symbology::Upce,
        Symbology::I2of5,
        Symbology::Itf14,
    ];

    /// Short display tag, e.g. `QR` or `EAN13`
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Qr => "QR",
            Symbology::MicroQr => "MicroQR",
            Symbology::Aztec => "Aztec",
            Symbology::DataMatrix => "DataMatrix",
            Symbology::Pdf417 => "PDF417",
            Symbology::Code39 => "Code39",
            Symbology::Code93 => "Code93",
            Symbology::Code128 => "Code128",
            Symbology::Ean8 => "EAN8",
            Symbology::Ean13 => "EAN13",
            Symbology::Upce => "UPCE",
            Symbology::I2of5 => "I2of5",
            Symbology::Itf14 => "ITF14",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], "");
        Symbology::ALL
            .iter()
            .copied()
            .find(|sym| sym.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown symbology: {s}"))
    }
}

/// One decoded barcode
#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeObservation {
    payload: Option<String>,
    symbology: Symbology,
    confidence: f32,
    corners: Option<[Point; 4]>,
}

impl BarcodeObservation {
    /// Create an observation. `confidence` is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(payload: Option<String>, symbology: Symbology, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            payload,
            symbology,
            confidence,
            corners: None,
        }
    }

    /// Attach the corner points of the located code, in upright image coordinates
    pub fn with_corners(mut self, corners: [Point; 4]) -> Self {
        self.corners = Some(corners);
        self
    }

    /// Decoded text, absent when the payload is not valid UTF-8
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Encoding standard of the code
    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    /// Decode confidence in `[0, 1]`
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Corner points of the code, when the reader locates them
    pub fn corners(&self) -> Option<&[Point; 4]> {
        self.corners.as_ref()
    }
}

/// The observations produced by one detection pass over one frame.
///
/// Order of `observations` is whatever the detector produced.
#[derive(Debug, Clone)]
pub struct ScanBatch {
    /// Sequence number of the camera sample the batch came from
    pub frame_sequence: u64,
    /// When the camera produced the sample
    pub captured_at: Instant,
    /// Orientation the detector was run with
    pub orientation: ImageOrientation,
    /// Decoded barcodes, possibly empty
    pub observations: Vec<BarcodeObservation>,
}

impl ScanBatch {
    /// Number of observations in the batch
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// True when nothing was decoded in the frame
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
