//! Header chrome detection.
//!
//! `detect_header` samples a few frames, runs a per-frame `EnvelopeDetector`
//! on each and aggregates the envelopes into one `DetectionResult`. Every
//! failure along the way degrades to the default proposal.

mod aggregate;
mod backend;
mod backends;
mod result;

use std::path::Path;

pub use aggregate::{aggregate_envelopes, default_detection, Tuning};
pub use backend::EnvelopeDetector;
pub use backends::edge::EdgeParams;
pub use backends::{EdgeDensityDetector, FixedEnvelopeDetector};
pub use result::{DetectionResult, Envelope, HeaderBand};

pub(crate) use aggregate::fraction_of;

use crate::frame::VideoDimensions;
use crate::sample::FrameSampler;

/// Sample `video`, detect chrome per frame and aggregate.
pub fn detect_header(
    sampler: &dyn FrameSampler,
    detector: &dyn EnvelopeDetector,
    video: &Path,
    dims: VideoDimensions,
    timestamps_ms: &[u64],
    band: HeaderBand,
) -> DetectionResult {
    let frames = match sampler.sample(video, dims, timestamps_ms) {
        Ok(frames) => frames,
        Err(e) => {
            log::warn!(
                "frame sampling unavailable for {} ({}): {:#}; using default header area",
                video.display(),
                sampler.name(),
                e
            );
            return default_detection(dims.height);
        }
    };

    let mut sampled = 0usize;
    let envelopes: Vec<Envelope> = frames
        .inspect(|_| sampled += 1)
        .filter_map(|frame| detector.detect(&frame, band))
        .collect();

    if envelopes.is_empty() {
        log::info!(
            "no header structure detected in {} sampled frame(s) of {}; using default",
            sampled,
            video.display()
        );
        return default_detection(dims.height);
    }

    let result = aggregate_envelopes(&envelopes, dims.height, band);
    let ui = envelopes
        .iter()
        .copied()
        .reduce(Envelope::union)
        .unwrap_or(Envelope::new(0, 0));
    log::info!(
        "{}: detected UI {}-{} in {}/{} frames ({:?}); banner y={} h={}",
        detector.name(),
        ui.top,
        ui.bottom,
        envelopes.len(),
        sampled,
        band,
        result.y,
        result.height
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::VideoFrame;
    use crate::sample::FrameIter;
    use anyhow::{anyhow, Result};
    use image::RgbImage;

    struct BlankSampler {
        frames: usize,
    }

    impl FrameSampler for BlankSampler {
        fn name(&self) -> &'static str {
            "blank"
        }

        fn sample<'a>(
            &'a self,
            _path: &'a Path,
            dims: VideoDimensions,
            timestamps_ms: &'a [u64],
        ) -> Result<FrameIter<'a>> {
            Ok(Box::new(timestamps_ms.iter().take(self.frames).map(
                move |&ts| VideoFrame::new(RgbImage::new(dims.width, dims.height), ts),
            )))
        }
    }

    struct BrokenSampler;

    impl FrameSampler for BrokenSampler {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn sample<'a>(
            &'a self,
            _path: &'a Path,
            _dims: VideoDimensions,
            _timestamps_ms: &'a [u64],
        ) -> Result<FrameIter<'a>> {
            Err(anyhow!("decoder missing"))
        }
    }

    const DIMS: VideoDimensions = VideoDimensions {
        width: 108,
        height: 1920,
    };

    #[test]
    fn zero_decoded_frames_use_default() {
        let sampler = BlankSampler { frames: 0 };
        let detector = FixedEnvelopeDetector::always(Envelope::new(40, 130));
        let result = detect_header(
            &sampler,
            &detector,
            Path::new("short.mp4"),
            DIMS,
            &[500, 1500, 2500],
            HeaderBand::Full,
        );
        assert_eq!(result, default_detection(1920));
        assert_eq!((result.y, result.height, result.content_padding), (0, 288, 20));
    }

    #[test]
    fn frames_without_chrome_use_default() {
        let sampler = BlankSampler { frames: 3 };
        let result = detect_header(
            &sampler,
            &FixedEnvelopeDetector::never(),
            Path::new("clean.mp4"),
            DIMS,
            &[500, 1500, 2500],
            HeaderBand::ProfileRow,
        );
        assert_eq!(result, default_detection(1920));
    }

    #[test]
    fn sampler_failure_uses_default() {
        let detector = FixedEnvelopeDetector::always(Envelope::new(40, 130));
        let result = detect_header(
            &BrokenSampler,
            &detector,
            Path::new("clip.mp4"),
            DIMS,
            &[500],
            HeaderBand::Full,
        );
        assert_eq!(result, default_detection(1920));
    }

    #[test]
    fn one_flickering_frame_is_tolerated() {
        let sampler = BlankSampler { frames: 3 };
        let detector = FixedEnvelopeDetector::new(vec![
            Some(Envelope::new(40, 130)),
            None,
            Some(Envelope::new(45, 120)),
        ]);
        let result = detect_header(
            &sampler,
            &detector,
            Path::new("clip.mp4"),
            DIMS,
            &[500, 1500, 2500],
            HeaderBand::Full,
        );
        assert_eq!((result.y, result.height), (0, 149));
    }
}
