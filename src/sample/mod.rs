//! Frame sampling.
//!
//! Samplers decode the frame nearest each requested timestamp:
//! - `FfmpegCliSampler`: one `ffmpeg` subprocess per timestamp (default)
//! - `FfmpegNextSampler`: in-process decode (feature: decode-ffmpeg-next)
//!
//! A timestamp that does not decode is skipped, never an error. Samplers only
//! fail when they cannot start at all.

use anyhow::Result;
use std::path::Path;

use crate::frame::{VideoDimensions, VideoFrame};

pub mod cli;
#[cfg(feature = "decode-ffmpeg-next")]
pub(crate) mod ffmpeg_next;

pub use cli::FfmpegCliSampler;
#[cfg(feature = "decode-ffmpeg-next")]
pub use ffmpeg_next::FfmpegNextSampler;

/// Early, mid and late points within the first 2.5 seconds.
pub const DEFAULT_SAMPLE_TIMESTAMPS_MS: [u64; 3] = [500, 1500, 2500];

/// Lazy sequence of successfully decoded frames.
pub type FrameIter<'a> = Box<dyn Iterator<Item = VideoFrame> + 'a>;

pub trait FrameSampler {
    /// Sampler identifier, for logs.
    fn name(&self) -> &'static str;

    /// Decode the frame nearest each timestamp, in order, skipping failures.
    fn sample<'a>(
        &'a self,
        path: &'a Path,
        dims: VideoDimensions,
        timestamps_ms: &'a [u64],
    ) -> Result<FrameIter<'a>>;
}
