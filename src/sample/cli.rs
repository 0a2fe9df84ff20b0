//! Frame sampling through the `ffmpeg` command-line tool.
//!
//! Each timestamp is one short-lived process that seeks, decodes a single
//! frame and writes it to stdout as packed RGB24. Nothing touches disk.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{FrameIter, FrameSampler};
use crate::frame::{VideoDimensions, VideoFrame};

#[derive(Clone, Debug)]
pub struct FfmpegCliSampler {
    ffmpeg_bin: PathBuf,
}

impl FfmpegCliSampler {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    fn decode_at(&self, path: &Path, dims: VideoDimensions, timestamp_ms: u64) -> Result<Option<VideoFrame>> {
        let seek = format!("{}.{:03}", timestamp_ms / 1000, timestamp_ms % 1000);
        let mut child = Command::new(&self.ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(&seek)
            .arg("-i")
            .arg(path)
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {}", self.ffmpeg_bin.display()))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout was not captured"))?;
        let mut pixels = Vec::with_capacity(dims.rgb24_len());
        stdout
            .read_to_end(&mut pixels)
            .context("read decoded frame from ffmpeg")?;
        let status = child.wait().context("wait for ffmpeg")?;

        // Past the end of the stream ffmpeg exits cleanly with no output.
        if !status.success() || pixels.len() < dims.rgb24_len() {
            return Ok(None);
        }
        pixels.truncate(dims.rgb24_len());
        VideoFrame::from_rgb24(pixels, dims.width, dims.height, timestamp_ms).map(Some)
    }
}

impl Default for FfmpegCliSampler {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FrameSampler for FfmpegCliSampler {
    fn name(&self) -> &'static str {
        "ffmpeg-cli"
    }

    fn sample<'a>(
        &'a self,
        path: &'a Path,
        dims: VideoDimensions,
        timestamps_ms: &'a [u64],
    ) -> Result<FrameIter<'a>> {
        if dims.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        if !path.exists() {
            return Err(anyhow!("video not found: {}", path.display()));
        }
        Ok(Box::new(timestamps_ms.iter().filter_map(move |&ts| {
            match self.decode_at(path, dims, ts) {
                Ok(Some(frame)) => Some(frame),
                Ok(None) => {
                    log::debug!("no frame at {}ms in {}", ts, path.display());
                    None
                }
                Err(e) => {
                    log::warn!("frame decode at {}ms failed for {}: {:#}", ts, path.display(), e);
                    None
                }
            }
        })))
    }
}
