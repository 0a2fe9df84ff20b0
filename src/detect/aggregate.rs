//! Multi-frame envelope aggregation.
//!
//! Per-frame envelopes are merged by union (min top, max bottom) so that a
//! single frame caught mid-transition cannot shrink coverage. The raw span is
//! then converted into a banner proposal with band-specific constants.

use crate::detect::result::{DetectionResult, Envelope, HeaderBand};

/// Banner height used when no frame produced an envelope.
pub const DEFAULT_HEIGHT_FRACTION: f64 = 0.15;
/// Content padding paired with the default banner.
pub const DEFAULT_CONTENT_PADDING: i32 = 20;

/// Scaling constants for one header band. Fractions are of total frame height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    /// Distance the banner starts above the detected chrome.
    pub shift_up: f64,
    /// Extra rows added below the chrome.
    pub buffer: f64,
    /// Minimum banner height.
    pub safety_floor: f64,
    /// A banner starting above this line is pulled to row 0.
    pub snap_threshold: f64,
    /// Maximum banner height.
    pub height_cap: f64,
    /// Content inset reported with the proposal, in pixels.
    pub content_padding: i32,
}

impl Tuning {
    pub const FULL: Tuning = Tuning {
        shift_up: 0.11,
        buffer: 0.01,
        safety_floor: 0.04,
        snap_threshold: 0.05,
        height_cap: 0.16,
        content_padding: 10,
    };

    pub const PROFILE_ROW: Tuning = Tuning {
        shift_up: 0.02,
        buffer: 0.005,
        safety_floor: 0.02,
        snap_threshold: 0.02,
        height_cap: 0.10,
        content_padding: 10,
    };

    pub fn for_band(band: HeaderBand) -> Tuning {
        match band {
            HeaderBand::Full => Tuning::FULL,
            HeaderBand::ProfileRow => Tuning::PROFILE_ROW,
        }
    }

    /// `(floor, cap)` in pixels for a frame of the given height.
    pub fn height_bounds(&self, total_height: u32) -> (i32, i32) {
        (
            fraction_of(total_height, self.safety_floor),
            fraction_of(total_height, self.height_cap),
        )
    }
}

/// Fixed proposal for videos where nothing was detected.
pub fn default_detection(total_height: u32) -> DetectionResult {
    DetectionResult {
        y: 0,
        height: fraction_of(total_height, DEFAULT_HEIGHT_FRACTION),
        content_padding: DEFAULT_CONTENT_PADDING,
    }
}

/// Merge per-frame envelopes into one banner proposal.
pub fn aggregate_envelopes(
    envelopes: &[Envelope],
    total_height: u32,
    band: HeaderBand,
) -> DetectionResult {
    let Some(ui) = envelopes.iter().copied().reduce(Envelope::union) else {
        return default_detection(total_height);
    };

    let tuning = Tuning::for_band(band);
    let shift_up = fraction_of(total_height, tuning.shift_up);
    let buffer = fraction_of(total_height, tuning.buffer);
    let (floor, cap) = tuning.height_bounds(total_height);

    let mut final_y = (ui.top - shift_up).max(0);
    if (final_y as f64) < total_height as f64 * tuning.snap_threshold {
        final_y = 0;
    }

    let final_height = ((ui.bottom - final_y) + buffer).max(floor).min(cap);

    DetectionResult {
        y: final_y,
        height: final_height,
        content_padding: tuning.content_padding,
    }
}

/// `len * fraction`, rounded to the nearest pixel.
pub(crate) fn fraction_of(len: u32, fraction: f64) -> i32 {
    (len as f64 * fraction).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u32 = 1920;

    #[test]
    fn no_envelopes_fall_back_to_default() {
        let full = aggregate_envelopes(&[], H, HeaderBand::Full);
        let slim = aggregate_envelopes(&[], H, HeaderBand::ProfileRow);
        let expected = DetectionResult {
            y: 0,
            height: 288,
            content_padding: 20,
        };
        assert_eq!(full, expected);
        assert_eq!(slim, expected);
    }

    #[test]
    fn headline_band_scenario() {
        let result = aggregate_envelopes(&[Envelope::new(40, 130)], H, HeaderBand::Full);
        assert_eq!(
            result,
            DetectionResult {
                y: 0,
                height: 149,
                content_padding: 10
            }
        );
    }

    #[test]
    fn profile_row_scenario() {
        let result = aggregate_envelopes(&[Envelope::new(40, 70)], H, HeaderBand::ProfileRow);
        assert_eq!(result.y, 0);
        assert_eq!(result.height, 80);
    }

    #[test]
    fn envelopes_are_unioned_across_frames() {
        let envelopes = [
            Envelope::new(300, 340),
            Envelope::new(320, 420),
            Envelope::new(310, 360),
        ];
        let result = aggregate_envelopes(&envelopes, H, HeaderBand::ProfileRow);
        // top 300 - 38 = 262, above the 38.4 snap line; bottom 420 + 10.
        assert_eq!(result.y, 262);
        assert_eq!(result.height, 168);
    }

    #[test]
    fn height_stays_within_floor_and_cap() {
        let extremes = [
            Envelope::new(0, 0),
            Envelope::new(500, 501),
            Envelope::new(-400, 10_000),
            Envelope::new(900, 100),
            Envelope::new(100, 1920),
        ];
        for band in [HeaderBand::Full, HeaderBand::ProfileRow] {
            let (floor, cap) = Tuning::for_band(band).height_bounds(H);
            for env in extremes {
                let result = aggregate_envelopes(&[env], H, band);
                assert!(
                    result.height >= floor && result.height <= cap,
                    "{:?} {:?} -> {}",
                    band,
                    env,
                    result.height
                );
                assert!(result.y >= 0);
            }
        }
    }

    #[test]
    fn snap_to_top_leaves_no_sliver() {
        for band in [HeaderBand::Full, HeaderBand::ProfileRow] {
            let snap_line = H as f64 * Tuning::for_band(band).snap_threshold;
            for top in (0..600).step_by(3) {
                let result = aggregate_envelopes(&[Envelope::new(top, top + 40)], H, band);
                assert!(
                    result.y == 0 || result.y as f64 >= snap_line,
                    "{:?} top={} y={}",
                    band,
                    top,
                    result.y
                );
            }
        }
    }

    #[test]
    fn zero_height_frames_do_not_panic() {
        let result = aggregate_envelopes(&[Envelope::new(10, 20)], 0, HeaderBand::Full);
        assert!(result.y >= 0);
        assert_eq!(result.height, 0);
        assert_eq!(default_detection(0).height, 0);
    }
}
