use image::GrayImage;
use tracing::trace;

use super::SymbologyReader;
use crate::models::{BarcodeObservation, Point, Symbology};

/// QR reader backed by `rqrr`.
///
/// Payloads that are not valid UTF-8 are reported without text. Confidence is
/// a geometric score of the located quadrilateral, see [`quad_confidence`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QrReader;

impl QrReader {
    /// Create a QR reader
    pub fn new() -> Self {
        Self
    }
}

impl SymbologyReader for QrReader {
    fn symbologies(&self) -> &'static [Symbology] {
        &[Symbology::Qr]
    }

    fn read(&self, image: &GrayImage) -> Vec<BarcodeObservation> {
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let raw = image.as_raw();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| raw[y * width + x]);

        let mut found = Vec::new();
        for grid in prepared.detect_grids() {
            let corners =
                [0, 1, 2, 3].map(|i| Point::new(grid.bounds[i].x as f32, grid.bounds[i].y as f32));
            let mut payload = Vec::new();
            match grid.decode_to(&mut payload) {
                Ok(meta) => {
                    trace!(
                        ecc_level = meta.ecc_level,
                        mask = meta.mask,
                        bytes = payload.len(),
                        "QR grid decoded"
                    );
                    let text = String::from_utf8(payload).ok();
                    found.push(
                        BarcodeObservation::new(text, Symbology::Qr, quad_confidence(&corners))
                            .with_corners(corners),
                    );
                }
                Err(err) => {
                    trace!(error = ?err, "QR grid located but not decodable");
                }
            }
        }
        found
    }
}

/// Score how close a located quadrilateral is to a square seen head-on.
///
/// Combines the longest/shortest side ratio with the mean corner cosine:
/// a perfect square scores 1.0, degenerate quads score 0.0.
pub fn quad_confidence(corners: &[Point; 4]) -> f32 {
    let sides: Vec<f32> = (0..4)
        .map(|i| corners[i].distance(&corners[(i + 1) % 4]))
        .collect();
    let min_side = sides.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max_side = sides.iter().fold(0.0f32, |a, &b| a.max(b));
    if min_side <= f32::EPSILON {
        return 0.0;
    }

    let mut cos_sum = 0.0f32;
    for i in 0..4 {
        let prev = &corners[(i + 3) % 4];
        let next = &corners[(i + 1) % 4];
        match corners[i].corner_cosine(prev, next) {
            Some(cos) => cos_sum += cos.abs(),
            None => return 0.0,
        }
    }

    let distortion = max_side / min_side - 1.0;
    let skew = cos_sum / 4.0;
    (1.0 / (1.0 + distortion + skew)).clamp(0.0, 1.0)
}
