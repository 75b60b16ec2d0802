use std::fmt;

use tracing::debug;

use super::{CaptureError, FrameSender, SessionPreset};
use crate::models::PixelFormat;

/// Which side of the device a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevicePosition {
    /// Facing away from the user
    Back,
    /// Facing the user
    Front,
    /// Not attached to a side (external or virtual cameras)
    Unspecified,
}

/// Kind of camera module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Standard built-in wide-angle camera
    BuiltInWideAngle,
    /// Built-in ultra-wide camera
    BuiltInUltraWide,
    /// Built-in telephoto camera
    BuiltInTelephoto,
    /// Externally attached camera
    External,
}

/// Static description of a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Stable identifier used to open the device
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Facing side
    pub position: DevicePosition,
    /// Camera module kind
    pub device_type: DeviceType,
}

/// Criteria for picking a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceQuery {
    /// Required facing side
    pub position: DevicePosition,
    /// Required module kind
    pub device_type: DeviceType,
}

impl DeviceQuery {
    /// True when `descriptor` satisfies the query
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        descriptor.position == self.position && descriptor.device_type == self.device_type
    }
}

impl Default for DeviceQuery {
    /// Back-facing built-in wide-angle camera
    fn default() -> Self {
        Self {
            position: DevicePosition::Back,
            device_type: DeviceType::BuiltInWideAngle,
        }
    }
}

impl fmt::Display for DeviceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.position, self.device_type)
    }
}

/// What the session asks a device to stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    /// Resolution
    pub preset: SessionPreset,
    /// Pixel layout of delivered frames
    pub pixel_format: PixelFormat,
}

/// An opened camera.
///
/// While streaming the device pushes samples into the [`FrameSender`] from a
/// thread it owns. `stop_streaming` must not return until that thread has
/// stopped delivering and dropped the sender.
pub trait CameraDevice: Send {
    /// Description of this device
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Pixel formats the device can produce
    fn supported_pixel_formats(&self) -> &[PixelFormat];

    /// Begin delivering samples
    fn start_streaming(
        &mut self,
        request: StreamRequest,
        sender: FrameSender,
    ) -> Result<(), CaptureError>;

    /// Stop delivering samples; a no-op when not streaming
    fn stop_streaming(&mut self);
}

/// Source of cameras
pub trait CameraProvider: Send + Sync {
    /// Every camera currently available
    fn devices(&self) -> Vec<DeviceDescriptor>;

    /// Open a camera by id
    fn open(&self, id: &str) -> Result<Box<dyn CameraDevice>, CaptureError>;
}

/// First camera offered by `provider` that satisfies `query`
pub fn discover(
    provider: &dyn CameraProvider,
    query: &DeviceQuery,
) -> Result<DeviceDescriptor, CaptureError> {
    let devices = provider.devices();
    debug!(available = devices.len(), query = %query, "discovering camera");
    devices
        .into_iter()
        .find(|d| query.matches(d))
        .ok_or(CaptureError::NoDevice(*query))
}
