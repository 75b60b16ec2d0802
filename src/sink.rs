//! Result delivery interface.

use crate::models::ScanBatch;

/// Consumer of detection results.
///
/// The pipeline calls the sink from a single delivery task, one batch at a
/// time, so implementations need no synchronization of their own. Batches
/// may be empty (nothing recognized in that frame).
pub trait ResultSink: Send + 'static {
    /// Receive every observation found in one frame
    fn on_barcodes_scanned(&mut self, batch: ScanBatch);
}

impl<F> ResultSink for F
where
    F: FnMut(ScanBatch) + Send + 'static,
{
    fn on_barcodes_scanned(&mut self, batch: ScanBatch) {
        self(batch)
    }
}
