use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Pixel layout of a camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luminance, one byte per pixel
    Luma8,
    /// Packed RGB, three bytes per pixel
    Rgb8,
    /// Packed RGBA, four bytes per pixel
    Rgba8,
    /// Full-range YpCbCr 4:2:0 bi-planar: a luma plane followed by an
    /// interleaved CbCr plane at half resolution
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel in the first plane
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Luma8 | PixelFormat::Nv12 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Minimum buffer length for a frame of the given size and first-plane
    /// stride, or `None` when it does not fit in `usize`
    pub fn required_len(&self, width: usize, height: usize, stride: usize) -> Option<usize> {
        match self {
            PixelFormat::Nv12 => {
                let rows = height.checked_add(height.div_ceil(2))?;
                stride.checked_mul(rows)
            }
            _ => {
                if height == 0 {
                    return Some(0);
                }
                let last_row = width.checked_mul(self.bytes_per_pixel())?;
                stride.checked_mul(height - 1)?.checked_add(last_row)
            }
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Luma8 => "luma8",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Nv12 => "nv12",
        };
        f.write_str(name)
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "luma" | "luma8" | "gray" => Ok(PixelFormat::Luma8),
            "rgb" | "rgb8" => Ok(PixelFormat::Rgb8),
            "rgba" | "rgba8" => Ok(PixelFormat::Rgba8),
            "nv12" | "420f" | "yuv420" => Ok(PixelFormat::Nv12),
            other => Err(format!("unknown pixel format: {other}")),
        }
    }
}

/// An image buffer produced by a camera.
///
/// The bytes are shared so a device can hand the same buffer to the pipeline
/// without copying; the pipeline never mutates them.
#[derive(Clone)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row of the first plane
    pub stride: usize,
    /// Pixel layout
    pub format: PixelFormat,
    /// Raw pixel bytes
    pub data: Arc<[u8]>,
}

impl Frame {
    /// Tightly packed frame (stride = width * bytes per pixel)
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data: data.into(),
        }
    }

    /// Buffer length needed for the declared geometry, `None` on overflow
    pub fn required_len(&self) -> Option<usize> {
        self.format
            .required_len(self.width as usize, self.height as usize, self.stride)
    }

    /// True when the buffer is large enough for the declared geometry
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && (self.width as usize)
                .checked_mul(self.format.bytes_per_pixel())
                .is_some_and(|row| self.stride >= row)
            && self
                .required_len()
                .is_some_and(|required| self.data.len() >= required)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// What a camera delivers per tick: timing metadata and, normally, an image.
///
/// Cameras occasionally produce samples without image data (for example while
/// the device is being reconfigured); those carry `image: None`.
#[derive(Debug, Clone)]
pub struct CameraSample {
    /// Monotonic sequence number assigned by the device
    pub sequence: u64,
    /// Capture time
    pub captured_at: Instant,
    image: Option<Frame>,
}

impl CameraSample {
    /// Sample carrying an image
    pub fn with_image(sequence: u64, frame: Frame) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            image: Some(frame),
        }
    }

    /// Sample without image payload
    pub fn empty(sequence: u64) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            image: None,
        }
    }

    /// Borrow the image buffer, if any
    pub fn image_buffer(&self) -> Option<&Frame> {
        self.image.as_ref()
    }

    /// Take the image buffer out of the sample
    pub fn into_image_buffer(self) -> Option<Frame> {
        self.image
    }
}
