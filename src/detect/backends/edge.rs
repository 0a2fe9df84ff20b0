use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;

use crate::detect::backend::EnvelopeDetector;
use crate::detect::result::{Envelope, HeaderBand};
use crate::frame::VideoFrame;

/// Tunables for the edge-density detector. Fractions are of frame width or height.
#[derive(Clone, Debug)]
pub struct EdgeParams {
    /// Only this top fraction of the frame is analysed.
    pub roi_fraction: f64,
    /// Gaussian sigma. 4.1 matches a 25x25 kernel.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub dilate_width: u32,
    pub dilate_height: u32,
    pub dilate_iterations: u32,
    pub min_width_fraction: f64,
    pub min_height_fraction: f64,
    /// Boxes starting above this line belong to the OS status bar.
    pub status_bar_fraction: f64,
    /// Boxes starting within this distance of the topmost box share its row.
    pub row_fraction: f64,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            roi_fraction: 0.25,
            blur_sigma: 4.1,
            canny_low: 30.0,
            canny_high: 100.0,
            dilate_width: 20,
            dilate_height: 8,
            dilate_iterations: 2,
            min_width_fraction: 0.05,
            min_height_fraction: 0.005,
            status_bar_fraction: 0.04,
            row_fraction: 0.03,
        }
    }
}

/// Structural chrome detector.
///
/// Blurs glyphs into blobs, finds their edges, bridges neighbouring text lines
/// with a wide-but-short dilation and reads the bounding boxes of the
/// resulting regions. It does not recognise anything; it assumes chrome is
/// high-contrast text or iconography near the top of the frame.
#[derive(Clone, Debug, Default)]
pub struct EdgeDensityDetector {
    params: EdgeParams,
}

impl EdgeDensityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: EdgeParams) -> Self {
        Self { params }
    }

    fn candidate_boxes(&self, frame: &VideoFrame) -> Vec<BoundingBox> {
        let p = &self.params;
        let width = frame.width();
        let roi_h = (frame.height() as f64 * p.roi_fraction) as u32;
        if width == 0 || roi_h == 0 {
            return Vec::new();
        }

        let roi = imageops::crop_imm(frame.image(), 0, 0, width, roi_h).to_image();
        let gray = imageops::grayscale(&roi);
        let blurred = gaussian_blur_f32(&gray, p.blur_sigma);
        let edges = canny(&blurred, p.canny_low, p.canny_high);
        let dilated = dilate_rect(&edges, p.dilate_width, p.dilate_height, p.dilate_iterations);
        external_boxes(&dilated)
    }
}

impl EnvelopeDetector for EdgeDensityDetector {
    fn name(&self) -> &'static str {
        "edge-density"
    }

    fn detect(&self, frame: &VideoFrame, band: HeaderBand) -> Option<Envelope> {
        let p = &self.params;
        let w = frame.width() as f64;
        let h = frame.height() as f64;
        let min_w = w * p.min_width_fraction;
        let min_h = h * p.min_height_fraction;
        let status_bar_h = h * p.status_bar_fraction;

        let mut rows: Vec<Envelope> = self
            .candidate_boxes(frame)
            .into_iter()
            .filter(|b| (b.width as f64) >= min_w)
            .filter(|b| (b.height as f64) >= min_h)
            .filter(|b| (b.y as f64) >= status_bar_h)
            .map(|b| Envelope::new(b.y, b.y + b.height))
            .collect();

        if band == HeaderBand::ProfileRow {
            rows.sort_by_key(|r| r.top);
            let first_top = rows.first()?.top as f64;
            let row_threshold = h * p.row_fraction;
            rows.retain(|r| (r.top as f64) < first_top + row_threshold);
        }

        rows.into_iter().reduce(Envelope::union)
    }
}

// ----------------------------------------------------------------------------
// Morphology and contour helpers
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BoundingBox {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl BoundingBox {
    fn of(points: &[Point<u32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for pt in points {
            min_x = min_x.min(pt.x);
            max_x = max_x.max(pt.x);
            min_y = min_y.min(pt.y);
            max_y = max_y.max(pt.y);
        }
        Some(Self {
            x: min_x as i32,
            y: min_y as i32,
            width: (max_x - min_x + 1) as i32,
            height: (max_y - min_y + 1) as i32,
        })
    }

    fn strictly_contains(&self, other: &BoundingBox) -> bool {
        self.x < other.x
            && self.y < other.y
            && self.x + self.width > other.x + other.width
            && self.y + self.height > other.y + other.height
    }
}

/// Bounding boxes of outermost regions. Outer borders nested inside another
/// region's hole are dropped.
fn external_boxes(image: &GrayImage) -> Vec<BoundingBox> {
    let boxes: Vec<BoundingBox> = find_contours::<u32>(image)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| BoundingBox::of(&c.points))
        .collect();

    boxes
        .iter()
        .filter(|b| !boxes.iter().any(|outer| outer.strictly_contains(b)))
        .copied()
        .collect()
}

/// Dilation with a `kw x kh` rectangle anchored at its centre.
///
/// A rectangular element is separable, so each iteration is a horizontal
/// running max followed by a vertical one.
fn dilate_rect(image: &GrayImage, kw: u32, kh: u32, iterations: u32) -> GrayImage {
    let mut out = image.clone();
    for _ in 0..iterations {
        out = max_filter_1d(&out, kw, true);
        out = max_filter_1d(&out, kh, false);
    }
    out
}

fn max_filter_1d(image: &GrayImage, k: u32, horizontal: bool) -> GrayImage {
    let (w, h) = image.dimensions();
    if k <= 1 || w == 0 || h == 0 {
        return image.clone();
    }
    let anchor = (k / 2) as i64;
    let len = (if horizontal { w } else { h }) as i64;
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let pos = (if horizontal { x } else { y }) as i64;
            let start = (pos - anchor).max(0);
            let end = (pos - anchor + k as i64 - 1).min(len - 1);
            let mut best = 0u8;
            for q in start..=end {
                let v = if horizontal {
                    image.get_pixel(q as u32, y)[0]
                } else {
                    image.get_pixel(x, q as u32)[0]
                };
                if v > best {
                    best = v;
                    if best == u8::MAX {
                        break;
                    }
                }
            }
            out.put_pixel(x, y, Luma([best]));
        }
    }
    out
}
