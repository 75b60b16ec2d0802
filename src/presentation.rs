//! Display ordering for delivered batches.
//!
//! The pipeline hands batches over unordered; this adapter ranks them by
//! descending confidence and renders one line per observation:
//!
//! ```text
//! 92.0: QR https://example.com
//! 47.0: EAN13 5901234123457
//! ```

use std::cmp::Ordering;
use std::io::Write;

use tracing::warn;

use crate::models::{BarcodeObservation, ScanBatch};
use crate::sink::ResultSink;

/// Observations sorted by descending confidence
pub fn rank(observations: &[BarcodeObservation]) -> Vec<&BarcodeObservation> {
    let mut ranked: Vec<&BarcodeObservation> = observations.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence()
            .partial_cmp(&a.confidence())
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// One display line, without newline
pub fn format_observation(observation: &BarcodeObservation) -> String {
    format!(
        "{:.1}: {} {}",
        observation.confidence() * 100.0,
        observation.symbology(),
        observation.payload().unwrap_or("nil")
    )
}

/// Ranked text for a batch, one newline-terminated line per observation.
/// An empty batch renders as an empty string.
pub fn render(batch: &ScanBatch) -> String {
    rank(&batch.observations)
        .into_iter()
        .map(|o| format_observation(o) + "\n")
        .collect()
}

/// Sink writing the ranked text of every batch to a writer
pub struct TextSink<W: Write + Send + 'static> {
    out: W,
    skip_empty: bool,
}

impl<W: Write + Send + 'static> TextSink<W> {
    /// Write every batch, empty ones included, to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            skip_empty: false,
        }
    }

    /// Do not write anything for empty batches
    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> ResultSink for TextSink<W> {
    fn on_barcodes_scanned(&mut self, batch: ScanBatch) {
        if self.skip_empty && batch.is_empty() {
            return;
        }
        let text = render(&batch);
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
        {
            warn!(error = %err, "failed to write scan results");
        }
    }
}
