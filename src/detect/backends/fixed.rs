use std::sync::atomic::{AtomicUsize, Ordering};

use crate::detect::backend::EnvelopeDetector;
use crate::detect::result::{Envelope, HeaderBand};
use crate::frame::VideoFrame;

/// Deterministic detector for testing. Replays a script of per-frame results,
/// cycling when it runs out; ignores pixels and band.
pub struct FixedEnvelopeDetector {
    script: Vec<Option<Envelope>>,
    cursor: AtomicUsize,
}

impl FixedEnvelopeDetector {
    pub fn new(script: Vec<Option<Envelope>>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Same envelope for every frame.
    pub fn always(envelope: Envelope) -> Self {
        Self::new(vec![Some(envelope)])
    }

    /// Never finds chrome.
    pub fn never() -> Self {
        Self::new(vec![None])
    }
}

impl EnvelopeDetector for FixedEnvelopeDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect(&self, _frame: &VideoFrame, _band: HeaderBand) -> Option<Envelope> {
        if self.script.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.script.len();
        self.script[idx]
    }
}
