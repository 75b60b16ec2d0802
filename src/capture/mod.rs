//! Camera session: device binding, output wiring and the start/stop lifecycle.
//!
//! ```text
//! Uninitialized ──begin/commit──▶ Idle ──start──▶ Running
//!                                  ▲                 │
//!                                  └──────stop───────┘
//!            any state ──teardown──▶ TornDown
//! ```
//!
//! Topology changes happen only through a [`SessionConfiguration`] obtained
//! from [`CaptureSession::begin_configuration`]. The guard borrows the session
//! mutably, so nothing can start, stop or deliver through the session while a
//! configuration is open. Dropping the guard without [`commit`] discards
//! everything staged in it.
//!
//! [`commit`]: SessionConfiguration::commit

/// Camera discovery and the device trait
pub mod device;
/// Virtual camera replaying still images
pub mod image_sequence;
/// Video data output and the frame channel
pub mod output;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use device::{
    CameraDevice, CameraProvider, DeviceDescriptor, DevicePosition, DeviceQuery, DeviceType,
    StreamRequest,
};
pub use output::{Delivery, FrameSender, VideoDataOutput, frame_channel};

/// Resolution the session asks the device for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPreset {
    /// 640x480
    Vga640x480,
    /// 1280x720
    Hd1280x720,
    /// 1920x1080
    Hd1920x1080,
}

impl SessionPreset {
    /// Frame width and height in landscape sensor orientation
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SessionPreset::Vga640x480 => (640, 480),
            SessionPreset::Hd1280x720 => (1280, 720),
            SessionPreset::Hd1920x1080 => (1920, 1080),
        }
    }
}

impl fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{w}x{h}")
    }
}

impl FromStr for SessionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vga" | "480p" | "640x480" => Ok(SessionPreset::Vga640x480),
            "hd" | "720p" | "1280x720" => Ok(SessionPreset::Hd1280x720),
            "fullhd" | "1080p" | "1920x1080" => Ok(SessionPreset::Hd1920x1080),
            other => Err(format!("unknown session preset: {other}")),
        }
    }
}

/// Lifecycle state of a [`CaptureSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No complete topology has been committed
    Uninitialized,
    /// A configuration bracket is open
    Configuring,
    /// Input and output wired, not streaming
    Idle,
    /// Device is streaming frames into the output
    Running,
    /// Released; the session cannot be used again
    TornDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Configuring => "configuring",
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

/// Errors raised by capture sessions and camera devices
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Nothing matched the device query
    #[error("no camera matches {0}")]
    NoDevice(DeviceQuery),

    /// The device exists but could not be opened
    #[error("failed to open camera {id}: {reason}")]
    DeviceOpen {
        /// Device identifier
        id: String,
        /// Backend specific cause
        reason: String,
    },

    /// The session refused the input
    #[error("session cannot add input {0}")]
    InputRejected(String),

    /// The session refused the video output
    #[error("session cannot add video output: {0}")]
    OutputRejected(String),

    /// The operation is not allowed in the current state
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        /// What was attempted
        operation: &'static str,
        /// State at the time
        state: SessionState,
    },

    /// Start was requested before a complete topology was committed
    #[error("session has no committed input and output")]
    NotConfigured,

    /// The device failed to start streaming
    #[error("camera stream failed: {0}")]
    StreamFailed(String),

    /// The session was torn down
    #[error("session has been torn down")]
    TornDown,
}

/// The camera hardware binding.
pub struct CaptureSession {
    state: SessionState,
    preset: SessionPreset,
    input: Option<Box<dyn CameraDevice>>,
    output: Option<VideoDataOutput>,
}

impl CaptureSession {
    /// Fresh, unconfigured session
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            preset: SessionPreset::Hd1280x720,
            input: None,
            output: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Committed resolution preset
    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    /// True while the device is streaming
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// True when an input device is committed
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// True when a video output is committed
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Open a configuration bracket.
    ///
    /// Fails while running (stop first) and after teardown.
    pub fn begin_configuration(&mut self) -> Result<SessionConfiguration<'_>, CaptureError> {
        match self.state {
            SessionState::Running | SessionState::Configuring => {
                return Err(CaptureError::InvalidState {
                    operation: "begin configuration",
                    state: self.state,
                });
            }
            SessionState::TornDown => return Err(CaptureError::TornDown),
            SessionState::Uninitialized | SessionState::Idle => {}
        }
        let previous = self.state;
        self.state = SessionState::Configuring;
        debug!(previous = %previous, "configuration begun");
        Ok(SessionConfiguration {
            preset: self.preset,
            input: None,
            output: None,
            previous,
            committed: false,
            session: self,
        })
    }

    /// Start frame delivery. A running session is left alone.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Running => {
                debug!("start ignored, session already running");
                Ok(())
            }
            SessionState::Idle => {
                let (Some(input), Some(output)) = (self.input.as_mut(), self.output.as_ref()) else {
                    return Err(CaptureError::NotConfigured);
                };
                let request = StreamRequest {
                    preset: self.preset,
                    pixel_format: output.pixel_format(),
                };
                input.start_streaming(request, output.sender())?;
                self.state = SessionState::Running;
                info!(
                    device = %input.descriptor().name,
                    preset = %self.preset,
                    format = %request.pixel_format,
                    "capture session running"
                );
                Ok(())
            }
            SessionState::TornDown => Err(CaptureError::TornDown),
            SessionState::Uninitialized | SessionState::Configuring => {
                Err(CaptureError::NotConfigured)
            }
        }
    }

    /// Halt frame delivery. Anything but a running session is left alone.
    pub fn stop(&mut self) {
        if self.state != SessionState::Running {
            debug!(state = %self.state, "stop ignored, session not running");
            return;
        }
        if let Some(input) = self.input.as_mut() {
            input.stop_streaming();
        }
        self.state = SessionState::Idle;
        info!("capture session stopped");
    }

    /// Stop and release the device and output. Frame channels close once the
    /// device has let go of its sender.
    pub fn teardown(&mut self) {
        if self.state == SessionState::TornDown {
            return;
        }
        self.stop();
        self.input = None;
        self.output = None;
        self.state = SessionState::TornDown;
        debug!("capture session torn down");
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("preset", &self.preset)
            .field("input", &self.input.as_ref().map(|d| d.descriptor().id.clone()))
            .field("output", &self.output)
            .finish()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// An open configuration bracket on a [`CaptureSession`].
///
/// Staged changes reach the session only on [`commit`](Self::commit).
pub struct SessionConfiguration<'a> {
    session: &'a mut CaptureSession,
    preset: SessionPreset,
    input: Option<Box<dyn CameraDevice>>,
    output: Option<VideoDataOutput>,
    previous: SessionState,
    committed: bool,
}

impl SessionConfiguration<'_> {
    /// Stage a resolution preset
    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    /// True when the session has no input yet and `device` produces at
    /// least one pixel format
    pub fn can_add_input(&self, device: &dyn CameraDevice) -> bool {
        self.input.is_none()
            && self.session.input.is_none()
            && !device.supported_pixel_formats().is_empty()
    }

    /// Stage an input device
    pub fn add_input(&mut self, device: Box<dyn CameraDevice>) -> Result<(), CaptureError> {
        if !self.can_add_input(device.as_ref()) {
            return Err(CaptureError::InputRejected(device.descriptor().id.clone()));
        }
        self.input = Some(device);
        Ok(())
    }

    /// True when there is an input whose device produces the output's pixel
    /// format and no output is attached yet
    pub fn can_add_output(&self, output: &VideoDataOutput) -> bool {
        if self.output.is_some() || self.session.output.is_some() {
            return false;
        }
        self.input
            .as_deref()
            .or(self.session.input.as_deref())
            .is_some_and(|device| {
                device
                    .supported_pixel_formats()
                    .contains(&output.pixel_format())
            })
    }

    /// Stage a video data output
    pub fn add_output(&mut self, output: VideoDataOutput) -> Result<(), CaptureError> {
        if !self.can_add_output(&output) {
            return Err(CaptureError::OutputRejected(format!(
                "{} output not supported by the session input",
                output.pixel_format()
            )));
        }
        self.output = Some(output);
        Ok(())
    }

    /// Apply the staged topology and close the bracket.
    ///
    /// The session becomes `Idle` when it ends up with both an input and an
    /// output, `Uninitialized` otherwise.
    pub fn commit(mut self) -> SessionState {
        self.committed = true;
        let session = &mut *self.session;
        session.preset = self.preset;
        if let Some(input) = self.input.take() {
            session.input = Some(input);
        }
        if let Some(output) = self.output.take() {
            session.output = Some(output);
        }
        session.state = if session.input.is_some() && session.output.is_some() {
            SessionState::Idle
        } else {
            SessionState::Uninitialized
        };
        debug!(state = %session.state, preset = %session.preset, "configuration committed");
        session.state
    }
}

impl Drop for SessionConfiguration<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.session.state = self.previous;
            warn!(state = %self.previous, "configuration abandoned, staged changes discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;

    struct Idle {
        descriptor: DeviceDescriptor,
        formats: Vec<PixelFormat>,
    }

    impl Idle {
        fn boxed(formats: Vec<PixelFormat>) -> Box<dyn CameraDevice> {
            Box::new(Idle {
                descriptor: DeviceDescriptor {
                    id: "idle".to_string(),
                    name: "Idle camera".to_string(),
                    position: DevicePosition::Back,
                    device_type: DeviceType::BuiltInWideAngle,
                },
                formats,
            })
        }
    }

    impl CameraDevice for Idle {
        fn descriptor(&self) -> &DeviceDescriptor {
            &self.descriptor
        }

        fn supported_pixel_formats(&self) -> &[PixelFormat] {
            &self.formats
        }

        fn start_streaming(
            &mut self,
            _request: StreamRequest,
            _sender: FrameSender,
        ) -> Result<(), CaptureError> {
            Ok(())
        }

        fn stop_streaming(&mut self) {}
    }

    #[test]
    fn test_device_without_formats_is_rejected() {
        let mut session = CaptureSession::new();
        let mut config = session.begin_configuration().unwrap();
        let blind = Idle::boxed(Vec::new());
        assert!(!config.can_add_input(blind.as_ref()));
        assert!(matches!(
            config.add_input(blind),
            Err(CaptureError::InputRejected(id)) if id == "idle"
        ));

        let camera = Idle::boxed(vec![PixelFormat::Nv12]);
        assert!(config.can_add_input(camera.as_ref()));
        config.add_input(camera).unwrap();
        assert!(!config.can_add_input(Idle::boxed(vec![PixelFormat::Nv12]).as_ref()));
    }

    #[test]
    fn test_abandoned_configuration_rolls_back() {
        let mut session = CaptureSession::new();
        {
            let mut config = session.begin_configuration().unwrap();
            config.add_input(Idle::boxed(vec![PixelFormat::Nv12])).unwrap();
        }
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(!session.has_input());
    }
}
