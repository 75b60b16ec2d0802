use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::models::{CameraSample, PixelFormat};

/// Outcome of handing one sample to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The sample is waiting for the processing task
    Queued,
    /// The previous sample was still pending, this one was discarded
    DroppedLate,
    /// The processing side has gone away
    Closed,
}

/// Device side of the frame channel.
///
/// With late-frame discarding the channel holds a single sample and anything
/// arriving while it is occupied is dropped. Without it, `deliver` blocks the
/// device thread until there is room, so it must not be called from inside
/// an async task.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<CameraSample>,
    discard_late: bool,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Push a sample towards the processing task
    pub fn deliver(&self, sample: CameraSample) -> Delivery {
        if self.discard_late {
            match self.tx.try_send(sample) {
                Ok(()) => Delivery::Queued,
                Err(TrySendError::Full(sample)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!(sequence = sample.sequence, "late frame discarded");
                    Delivery::DroppedLate
                }
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            }
        } else {
            match self.tx.blocking_send(sample) {
                Ok(()) => Delivery::Queued,
                Err(_) => Delivery::Closed,
            }
        }
    }

    /// True once the processing side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether late samples are discarded
    pub fn discards_late_frames(&self) -> bool {
        self.discard_late
    }

    /// Shared count of discarded samples
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

/// Create the frame channel between a device and the processing task.
///
/// `queue_depth` applies only when late frames are kept.
pub fn frame_channel(
    discard_late: bool,
    queue_depth: usize,
) -> (FrameSender, mpsc::Receiver<CameraSample>) {
    let capacity = if discard_late { 1 } else { queue_depth.max(1) };
    let (tx, rx) = mpsc::channel(capacity);
    let sender = FrameSender {
        tx,
        discard_late,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

/// The video data output attached to a session
#[derive(Debug)]
pub struct VideoDataOutput {
    pixel_format: PixelFormat,
    sender: FrameSender,
}

impl VideoDataOutput {
    /// Output producing `pixel_format` frames into `sender`
    pub fn new(pixel_format: PixelFormat, sender: FrameSender) -> Self {
        Self {
            pixel_format,
            sender,
        }
    }

    /// Requested pixel layout
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Whether late frames are discarded
    pub fn discards_late_frames(&self) -> bool {
        self.sender.discards_late_frames()
    }

    /// A sender for the device to stream into
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }
}
