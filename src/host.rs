//! Visibility-driven control of a pipeline.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::ScanError;
use crate::permission::{PermissionProvider, check_permission};
use crate::pipeline::ScanPipeline;
use crate::sink::ResultSink;

/// Drives a [`ScanPipeline`] from the visibility of the surface showing it.
///
/// Becoming visible checks camera permission, configures the pipeline the
/// first time and starts it. Becoming hidden stops it. Once permission has
/// been refused the controller never touches the pipeline again.
pub struct ScanController<S: ResultSink> {
    pipeline: Arc<ScanPipeline>,
    permission: Arc<dyn PermissionProvider>,
    sink: Option<S>,
    denied: bool,
}

impl<S: ResultSink> ScanController<S> {
    /// Controller delivering results to `sink` once configured
    pub fn new(pipeline: Arc<ScanPipeline>, permission: Arc<dyn PermissionProvider>, sink: S) -> Self {
        Self {
            pipeline,
            permission,
            sink: Some(sink),
            denied: false,
        }
    }

    /// The controlled pipeline
    pub fn pipeline(&self) -> &Arc<ScanPipeline> {
        &self.pipeline
    }

    /// Check permission, configure on first use, then start.
    ///
    /// Returns [`ScanError::PermissionDenied`] when access is refused; the
    /// host is expected to tell the user and stop using the scanner.
    pub async fn became_visible(&mut self) -> Result<(), ScanError> {
        if self.denied {
            return Err(ScanError::PermissionDenied);
        }
        if !check_permission(self.permission.as_ref()).await {
            self.denied = true;
            error!("camera permission denied, scanner disabled");
            return Err(ScanError::PermissionDenied);
        }

        if let Some(sink) = self.sink.take() {
            debug!("configuring scan pipeline on first appearance");
            // A failed configuration consumes the sink, so later appearances
            // only retry `start`, which then reports `NotConfigured`.
            self.pipeline.configure(sink)?;
        }
        self.pipeline.start()
    }

    /// Stop scanning
    pub fn became_hidden(&mut self) {
        if !self.denied {
            self.pipeline.stop();
        }
    }
}
