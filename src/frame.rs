//! Decoded frames and probed video geometry.
//!
//! - `VideoFrame`: an RGB raster sampled at a known timestamp. Immutable once built.
//! - `VideoDimensions`: width/height of the primary video stream as reported by the probe.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// Width and height of a video's primary stream, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero. Such videos still resolve to a layout.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte length of one packed RGB24 frame at these dimensions.
    pub fn rgb24_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }
}

// ----------------------------------------------------------------------------
// VideoFrame
// ----------------------------------------------------------------------------

/// One decoded frame. Pixels are private; consumers read through `image()`.
pub struct VideoFrame {
    image: RgbImage,
    timestamp_ms: u64,
}

impl VideoFrame {
    pub fn new(image: RgbImage, timestamp_ms: u64) -> Self {
        Self {
            image,
            timestamp_ms,
        }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb24(pixels: Vec<u8>, width: u32, height: u32, timestamp_ms: u64) -> Result<Self> {
        let expected = VideoDimensions::new(width, height).rgb24_len();
        if pixels.len() != expected {
            return Err(anyhow!(
                "rgb24 buffer is {} bytes, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("rgb24 buffer does not fit {}x{}", width, height))?;
        Ok(Self::new(image, timestamp_ms))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> VideoDimensions {
        VideoDimensions::new(self.width(), self.height())
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("timestamp_ms", &self.timestamp_ms)
            .finish()
    }
}
