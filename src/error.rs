use thiserror::Error;

use crate::capture::CaptureError;

/// Failures surfaced to the host of a scanning pipeline.
///
/// Per-frame problems (samples without image, detection failures) never
/// appear here; the pipeline logs and counts them.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Camera access was refused; the pipeline must not run
    #[error("camera permission denied")]
    PermissionDenied,

    /// No usable camera could be found or opened
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(#[source] CaptureError),

    /// The session refused the input or output
    #[error("capture configuration failed: {0}")]
    Configuration(#[source] CaptureError),

    /// The session could not start streaming
    #[error("capture session failed to start: {0}")]
    Start(#[source] CaptureError),

    /// The pipeline was created outside a tokio runtime
    #[error("scan pipeline requires a tokio runtime")]
    NoRuntime,
}

/// Result alias for host facing operations
pub type Result<T, E = ScanError> = std::result::Result<T, E>;
