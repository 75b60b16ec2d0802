//! Device orientation to image orientation mapping
//!
//! Readers are not orientation-agnostic and the camera sensor is fixed to the
//! device body, so each frame is tagged with the orientation that brings the
//! sensor image upright for the current physical pose of the device.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Physical orientation of the device, as reported by its motion sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceOrientation {
    /// Orientation not known
    #[default]
    Unknown = 0,
    /// Upright, home button at the bottom
    Portrait = 1,
    /// Upside down, home button at the top
    PortraitUpsideDown = 2,
    /// Landscape, device rotated so its left side is down
    LandscapeLeft = 3,
    /// Landscape, device rotated so its right side is down
    LandscapeRight = 4,
    /// Flat, screen facing up
    FaceUp = 5,
    /// Flat, screen facing down
    FaceDown = 6,
}

impl DeviceOrientation {
    /// All device orientations
    pub const ALL: [DeviceOrientation; 7] = [
        DeviceOrientation::Unknown,
        DeviceOrientation::Portrait,
        DeviceOrientation::PortraitUpsideDown,
        DeviceOrientation::LandscapeLeft,
        DeviceOrientation::LandscapeRight,
        DeviceOrientation::FaceUp,
        DeviceOrientation::FaceDown,
    ];

    fn from_u8(value: u8) -> Self {
        match value {
            1 => DeviceOrientation::Portrait,
            2 => DeviceOrientation::PortraitUpsideDown,
            3 => DeviceOrientation::LandscapeLeft,
            4 => DeviceOrientation::LandscapeRight,
            5 => DeviceOrientation::FaceUp,
            6 => DeviceOrientation::FaceDown,
            _ => DeviceOrientation::Unknown,
        }
    }
}

impl std::str::FromStr for DeviceOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "unknown" => Ok(DeviceOrientation::Unknown),
            "portrait" => Ok(DeviceOrientation::Portrait),
            "portraitupsidedown" | "upsidedown" => Ok(DeviceOrientation::PortraitUpsideDown),
            "landscapeleft" => Ok(DeviceOrientation::LandscapeLeft),
            "landscaperight" => Ok(DeviceOrientation::LandscapeRight),
            "faceup" => Ok(DeviceOrientation::FaceUp),
            "facedown" => Ok(DeviceOrientation::FaceDown),
            other => Err(format!("unknown device orientation: {other}")),
        }
    }
}

/// Orientation of image content relative to the stored pixel grid,
/// using the EXIF / TIFF numbering (1..=8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageOrientation {
    /// 1: stored upright
    #[default]
    Up,
    /// 2: mirrored horizontally
    UpMirrored,
    /// 3: rotated 180°
    Down,
    /// 4: mirrored vertically
    DownMirrored,
    /// 5: mirrored along the main diagonal
    LeftMirrored,
    /// 6: needs a 90° clockwise rotation to be upright
    Right,
    /// 7: mirrored along the anti-diagonal
    RightMirrored,
    /// 8: needs a 90° counter-clockwise rotation to be upright
    Left,
}

impl ImageOrientation {
    /// EXIF orientation tag value
    pub fn exif(&self) -> u8 {
        match self {
            ImageOrientation::Up => 1,
            ImageOrientation::UpMirrored => 2,
            ImageOrientation::Down => 3,
            ImageOrientation::DownMirrored => 4,
            ImageOrientation::LeftMirrored => 5,
            ImageOrientation::Right => 6,
            ImageOrientation::RightMirrored => 7,
            ImageOrientation::Left => 8,
        }
    }

    /// Parse an EXIF orientation tag value
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            1 => Some(ImageOrientation::Up),
            2 => Some(ImageOrientation::UpMirrored),
            3 => Some(ImageOrientation::Down),
            4 => Some(ImageOrientation::DownMirrored),
            5 => Some(ImageOrientation::LeftMirrored),
            6 => Some(ImageOrientation::Right),
            7 => Some(ImageOrientation::RightMirrored),
            8 => Some(ImageOrientation::Left),
            _ => None,
        }
    }

    /// True when width and height swap once the image is made upright
    pub fn swaps_axes(&self) -> bool {
        self.exif() >= 5
    }
}

impl std::str::FromStr for ImageOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(tag) = s.trim().parse::<u8>() {
            return ImageOrientation::from_exif(tag)
                .ok_or_else(|| format!("EXIF orientation out of range: {tag}"));
        }
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "up" => Ok(ImageOrientation::Up),
            "upmirrored" => Ok(ImageOrientation::UpMirrored),
            "down" => Ok(ImageOrientation::Down),
            "downmirrored" => Ok(ImageOrientation::DownMirrored),
            "leftmirrored" => Ok(ImageOrientation::LeftMirrored),
            "right" => Ok(ImageOrientation::Right),
            "rightmirrored" => Ok(ImageOrientation::RightMirrored),
            "left" => Ok(ImageOrientation::Left),
            other => Err(format!("unknown image orientation: {other}")),
        }
    }
}

/// Map the device pose to the orientation the detector must assume for
/// sensor-relative frames.
pub fn resolve(device: DeviceOrientation) -> ImageOrientation {
    match device {
        DeviceOrientation::PortraitUpsideDown => ImageOrientation::Left,
        DeviceOrientation::LandscapeLeft => ImageOrientation::UpMirrored,
        DeviceOrientation::LandscapeRight => ImageOrientation::Down,
        _ => ImageOrientation::Up,
    }
}

/// Source of the current device orientation, polled once per frame
pub trait OrientationSource: Send + Sync {
    /// Orientation right now
    fn current(&self) -> DeviceOrientation;
}

/// Orientation that never changes
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOrientation(pub DeviceOrientation);

impl OrientationSource for FixedOrientation {
    fn current(&self) -> DeviceOrientation {
        self.0
    }
}

/// Orientation updated by the host (for example from a sensor callback) and
/// read by the processing context without locking.
#[derive(Debug, Clone, Default)]
pub struct SharedOrientation {
    value: Arc<AtomicU8>,
}

impl SharedOrientation {
    /// Start at the given orientation
    pub fn new(initial: DeviceOrientation) -> Self {
        Self {
            value: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    /// Publish a new orientation
    pub fn set(&self, orientation: DeviceOrientation) {
        self.value.store(orientation as u8, Ordering::Relaxed);
    }
}

impl OrientationSource for SharedOrientation {
    fn current(&self) -> DeviceOrientation {
        DeviceOrientation::from_u8(self.value.load(Ordering::Relaxed))
    }
}
