//! Banner layout resolution.
//!
//! Two constraints decide the banner: it must cover the chrome the detector
//! found, and it must be tall enough for the branding composed into it. The
//! resolver takes the larger of the two, then applies the user's vertical
//! correction.
//!
//! All design sizes are expressed at a 380px reference width and scaled to
//! the video. `DesignMetrics` does that scaling once; the compositor reads the
//! same struct so measured and rendered sizes cannot drift.

use crate::branding::BrandingConfig;
use crate::detect::{fraction_of, DetectionResult, HeaderBand};
use crate::frame::VideoDimensions;
use crate::store::LayoutPlan;
use crate::text::TextLayout;

/// Width the design sizes are authored at.
pub const DESIGN_REFERENCE_WIDTH: f64 = 380.0;
/// Extra factor applied to every font size.
pub const FONT_SCALE: f64 = 1.35;
/// Name/handle row height as a multiple of font size.
const ROW_LINE_FACTOR: f64 = 1.2;

/// Banner height when auto-detection is disabled.
pub const FIXED_HEIGHT_FRACTION: f64 = 0.15;
/// Content inset when auto-detection is disabled, as a fraction of width.
pub const FIXED_PADDING_FRACTION: f64 = 0.04;

/// Pixel sizes for one video width.
#[derive(Clone, Debug, PartialEq)]
pub struct DesignMetrics {
    pub width: u32,
    pub scale: f64,
    pub logo_size: i32,
    pub name_font: i32,
    pub handle_font: i32,
    pub headline_font: i32,
    pub badge_size: i32,
    pub padding_left: i32,
    pub vertical_padding: i32,
    pub gap: i32,
    pub text_inset_x: i32,
    pub logo_lift: i32,
}

impl DesignMetrics {
    pub fn new(branding: &BrandingConfig, width: u32) -> Self {
        let scale = width as f64 / DESIGN_REFERENCE_WIDTH;
        let px = |v: f64| v as i32;
        let font = |size: f64| px(size * scale * FONT_SCALE);
        Self {
            width,
            scale,
            logo_size: px(width as f64 * branding.logo_size_percent / 100.0),
            name_font: font(branding.name_font_size),
            handle_font: font(branding.handle_font_size),
            headline_font: font(branding.headline_font_size),
            badge_size: px(branding.badge_size * scale),
            padding_left: px(22.0 * scale),
            vertical_padding: px(12.0 * scale),
            gap: px(8.0 * scale),
            text_inset_x: px(24.0 * scale),
            logo_lift: px(3.5 * scale),
        }
    }

    /// Height of the logo / name+handle row.
    pub fn identity_row_height(&self) -> i32 {
        let text = (self.name_font as f64 * ROW_LINE_FACTOR) as i32
            + (self.handle_font as f64 * ROW_LINE_FACTOR) as i32;
        self.logo_size.max(text)
    }

    /// Smallest banner that fits the composed content.
    pub fn design_min_height(&self, headline: Option<&TextLayout>) -> i32 {
        let text_height = headline.map_or(0, TextLayout::height);
        let extra = if text_height > 0 {
            3 * self.vertical_padding + self.gap
        } else {
            2 * self.vertical_padding
        };
        self.identity_row_height() + text_height + extra
    }
}

/// Where the banner goes on the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BannerPlacement {
    /// Top row. May be negative or past the frame after correction.
    pub y: i32,
    pub height: i32,
    pub content_padding: i32,
}

impl BannerPlacement {
    /// Placement for a layout resolved without detection.
    pub fn fixed(dims: VideoDimensions) -> Self {
        Self {
            y: 0,
            height: fraction_of(dims.height, FIXED_HEIGHT_FRACTION),
            content_padding: fraction_of(dims.width, FIXED_PADDING_FRACTION),
        }
    }
}

impl From<DetectionResult> for BannerPlacement {
    fn from(d: DetectionResult) -> Self {
        Self {
            y: d.y,
            height: d.height,
            content_padding: d.content_padding,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLayout {
    pub placement: BannerPlacement,
    pub plan: LayoutPlan,
    pub metrics: DesignMetrics,
    /// Wrapped headline, `None` when no headline is shown.
    pub headline: Option<TextLayout>,
    /// What detection proposed, when it ran.
    pub detection: Option<DetectionResult>,
}

/// Resolve the banner for one reel.
///
/// `detect` is called at most once, and only when auto-detection is enabled.
pub fn resolve_layout(
    branding: &BrandingConfig,
    dims: VideoDimensions,
    headline: Option<&str>,
    detect: impl FnOnce(HeaderBand) -> DetectionResult,
) -> ResolvedLayout {
    let metrics = DesignMetrics::new(branding, dims.width);
    let headline = headline
        .map(|text| TextLayout::wrap(text, &metrics))
        .filter(|layout| !layout.is_empty());

    let (mut placement, detection) = if branding.auto_detect {
        let band = HeaderBand::for_headline(branding.show_headline);
        let detection = detect(band);
        let design_min = metrics.design_min_height(headline.as_ref());
        let mut placement = BannerPlacement::from(detection);
        placement.height = detection.height.max(design_min);
        log::debug!(
            "layout {}x{}: detected h={} design min={} -> h={}",
            dims.width,
            dims.height,
            detection.height,
            design_min,
            placement.height
        );
        (placement, Some(detection))
    } else {
        (BannerPlacement::fixed(dims), None)
    };

    placement.y += branding.vertical_correction;

    ResolvedLayout {
        plan: LayoutPlan {
            y: placement.y,
            h: placement.height,
            correction: branding.vertical_correction,
            width: dims.width,
            height: dims.height,
        },
        placement,
        metrics,
        headline,
        detection,
    }
}
