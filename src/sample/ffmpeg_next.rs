//! In-process frame sampling using FFmpeg bindings.
//!
//! The input is opened once per video; each timestamp seeks backwards to the
//! nearest keyframe and decodes forward until the first frame at or after
//! the requested time. Frames are scaled to RGB24 in memory.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

use super::{FrameIter, FrameSampler};
use crate::frame::{VideoDimensions, VideoFrame};

#[derive(Clone, Debug, Default)]
pub struct FfmpegNextSampler;

impl FfmpegNextSampler {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSampler for FfmpegNextSampler {
    fn name(&self) -> &'static str {
        "ffmpeg-next"
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
        let decoder = SeekingDecoder::open(path)?;
        Ok(Box::new(SeekingFrames {
            decoder,
            timestamps: timestamps_ms.iter(),
        }))
    }
}

struct SeekingFrames<'a> {
    decoder: SeekingDecoder,
    timestamps: std::slice::Iter<'a, u64>,
}

impl Iterator for SeekingFrames<'_> {
    type Item = VideoFrame;

    fn next(&mut self) -> Option<VideoFrame> {
        for &ts in self.timestamps.by_ref() {
            match self.decoder.frame_at(ts) {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => log::debug!("no frame at {}ms (ffmpeg-next)", ts),
                Err(e) => log::warn!("frame decode at {}ms failed: {:#}", ts, e),
            }
        }
        None
    }
}

struct SeekingDecoder {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
}

impl SeekingDecoder {
    fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open '{}' with ffmpeg", path.display()))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            stream_index,
            time_base,
            decoder,
            scaler,
        })
    }

    fn frame_at(&mut self, timestamp_ms: u64) -> Result<Option<VideoFrame>> {
        let target_us = (timestamp_ms as i64).saturating_mul(1000);
        self.input
            .seek(target_us, ..target_us)
            .context("seek input")?;
        self.decoder.flush();

        let target_pts = self.stream_ts(timestamp_ms);

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            let frame =
                receive_at_or_after(&mut self.decoder, &mut self.scaler, target_pts, timestamp_ms)?;
            if frame.is_some() {
                return Ok(frame);
            }
        }

        // Reordering decoders hold the last frames until end of stream.
        self.decoder.send_eof().context("drain ffmpeg decoder")?;
        receive_at_or_after(&mut self.decoder, &mut self.scaler, target_pts, timestamp_ms)
    }

    fn stream_ts(&self, timestamp_ms: u64) -> i64 {
        let num = i64::from(self.time_base.numerator());
        let den = i64::from(self.time_base.denominator());
        if num == 0 {
            return 0;
        }
        (timestamp_ms as i64).saturating_mul(den) / num.saturating_mul(1000)
    }
}

/// First frame the decoder can hand out with a timestamp at or after
/// `target_pts`, converted to RGB24.
fn receive_at_or_after(
    decoder: &mut ffmpeg::codec::decoder::Video,
    scaler: &mut ffmpeg::software::scaling::Context,
    target_pts: i64,
    timestamp_ms: u64,
) -> Result<Option<VideoFrame>> {
    let mut decoded = ffmpeg::frame::Video::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        let pts = decoded.timestamp().or_else(|| decoded.pts()).unwrap_or(i64::MAX);
        if pts < target_pts {
            continue;
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        return VideoFrame::from_rgb24(pixels, width, height, timestamp_ms).map(Some);
    }
    Ok(None)
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its geometry")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
