use crate::detect::result::{Envelope, HeaderBand};
use crate::frame::VideoFrame;

/// Per-frame chrome detector.
///
/// Implementations look only at pixels. They return the envelope of chrome in
/// the upper part of the frame, or `None` when nothing qualifies. A detector
/// never fails: a frame it cannot analyse is a frame with no chrome.
pub trait EnvelopeDetector: Send {
    /// Detector identifier.
    fn name(&self) -> &'static str;

    /// Locate chrome in one frame.
    fn detect(&self, frame: &VideoFrame, band: HeaderBand) -> Option<Envelope>;
}
