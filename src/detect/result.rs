use serde::Serialize;

/// Vertical span of detected chrome in one frame, in pixel rows.
///
/// `bottom` is exclusive (top row of the box plus its height).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub top: i32,
    pub bottom: i32,
}

impl Envelope {
    pub fn new(top: i32, bottom: i32) -> Self {
        Self { top, bottom }
    }

    /// Union of two spans.
    pub fn union(self, other: Envelope) -> Envelope {
        Envelope {
            top: self.top.min(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Aggregated banner proposal derived from one or more envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    /// Banner top row. Never negative.
    pub y: i32,
    /// Banner height. Within the active tuning's floor and cap.
    pub height: i32,
    /// Vertical inset for content inside the banner.
    pub content_padding: i32,
}

/// Which part of the host app's header is treated as chrome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HeaderBand {
    /// Name/handle row and the headline line below it.
    Full,
    /// Only the topmost identity row (slim banner).
    ProfileRow,
}

impl HeaderBand {
    pub fn for_headline(show_headline: bool) -> Self {
        if show_headline {
            HeaderBand::Full
        } else {
            HeaderBand::ProfileRow
        }
    }
}
