//! Overlay rendering.
//!
//! Produces a transparent full-frame RGBA image: the banner rectangle plus
//! logo, name, badge, handle and headline. Placement comes entirely from the
//! `ResolvedLayout`; the headline lines drawn are the ones the resolver
//! measured.
//!
//! Missing assets degrade instead of failing: no logo draws a placeholder
//! ring, no badge is skipped, no font skips text.

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::branding::BrandingConfig;
use crate::config::AssetSettings;
use crate::frame::VideoDimensions;
use crate::layout::ResolvedLayout;

const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([0x10, 0xb9, 0x81, 255]);
const RIM_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Logo rim width as a fraction of logo size.
const RIM_FRACTION: f64 = 0.02;
/// The `@` of a handle is drawn this many pixels larger than the rest.
const AT_SIGN_BOOST: i32 = 2;

const BOLD_FACES: &[&str] = &["Montserrat-Bold.ttf"];
const REGULAR_FACES: &[&str] = &["Montserrat-Regular.ttf"];
const LIGHT_FACES: &[&str] = &["Montserrat-Light.ttf"];

const SYSTEM_BOLD: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];
const SYSTEM_REGULAR: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];
const SYSTEM_LIGHT: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-ExtraLight.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-ExtraLight.ttf",
];

/// Bold, regular and light faces. Any of them may be missing.
#[derive(Default)]
pub struct FontSet {
    bold: Option<FontVec>,
    regular: Option<FontVec>,
    light: Option<FontVec>,
}

impl FontSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look in `fonts_dir` first, then in common system locations.
    pub fn load(fonts_dir: &Path) -> Self {
        let candidates = |local: &[&str], system: &[&str]| -> Vec<PathBuf> {
            local
                .iter()
                .map(|name| fonts_dir.join(name))
                .chain(system.iter().map(PathBuf::from))
                .collect()
        };
        let set = Self {
            bold: load_face(&candidates(BOLD_FACES, SYSTEM_BOLD)),
            regular: load_face(&candidates(REGULAR_FACES, SYSTEM_REGULAR)),
            light: load_face(&candidates(LIGHT_FACES, SYSTEM_LIGHT)),
        };
        if set.is_empty() {
            log::warn!(
                "no usable fonts in {} or system paths; overlay text will be skipped",
                fonts_dir.display()
            );
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.bold.is_none() && self.regular.is_none() && self.light.is_none()
    }

    fn bold(&self) -> Option<&FontVec> {
        self.bold
            .as_ref()
            .or(self.regular.as_ref())
            .or(self.light.as_ref())
    }

    fn regular(&self) -> Option<&FontVec> {
        self.regular
            .as_ref()
            .or(self.light.as_ref())
            .or(self.bold.as_ref())
    }

    fn light(&self) -> Option<&FontVec> {
        self.light
            .as_ref()
            .or(self.regular.as_ref())
            .or(self.bold.as_ref())
    }
}

fn load_face(candidates: &[PathBuf]) -> Option<FontVec> {
    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                log::debug!("loaded font {}", path.display());
                return Some(font);
            }
            Err(e) => log::warn!("skipping font {}: {}", path.display(), e),
        }
    }
    None
}

/// Pixel positions of the overlay elements. The badge x and the handle body
/// depend on measured glyph widths and are resolved through the methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arrangement {
    /// Visible banner rows as `(top, height)`, `None` when fully off-canvas.
    pub banner: Option<(u32, u32)>,
    pub logo_origin: (i32, i32),
    pub logo_size: i32,
    pub name_origin: (i32, i32),
    /// Badge top edge, centred on the name row.
    pub badge_y: i32,
    pub badge_size: i32,
    pub handle_y: i32,
    gap: i32,
    /// Headline lines with their top-left corners.
    pub headline: Vec<(i32, i32, String)>,
}

pub fn arrange(layout: &ResolvedLayout, dims: VideoDimensions) -> Arrangement {
    let m = &layout.metrics;
    let p = &layout.placement;

    let top = p.y.max(0) as i64;
    let bottom = (p.y as i64 + p.height as i64).min(dims.height as i64);
    let banner = (dims.width > 0 && bottom > top).then(|| (top as u32, (bottom - top) as u32));

    let content_start = p.y + m.vertical_padding.max(p.content_padding);
    let logo_y = content_start - m.logo_lift;
    let name_origin = (m.padding_left + m.logo_size + m.gap, logo_y);

    let headline_y = logo_y + m.logo_size + m.vertical_padding + m.gap;
    let headline = layout
        .headline
        .iter()
        .flat_map(|text| {
            text.lines.iter().enumerate().map(move |(i, line)| {
                (
                    m.text_inset_x,
                    headline_y + i as i32 * text.line_advance,
                    line.clone(),
                )
            })
        })
        .collect();

    Arrangement {
        banner,
        logo_origin: (m.padding_left, logo_y),
        logo_size: m.logo_size,
        name_origin,
        badge_y: logo_y + m.name_font / 2 - m.badge_size / 2,
        badge_size: m.badge_size,
        handle_y: name_origin.1 + m.name_font,
        gap: m.gap,
        headline,
    }
}

impl Arrangement {
    /// Badge top-left once the drawn name is `name_width` pixels wide.
    pub fn badge_origin(&self, name_width: i32) -> (i32, i32) {
        (self.name_origin.0 + name_width + self.gap, self.badge_y)
    }

    /// Handle text origin after an `@` that is `at_width` pixels wide.
    pub fn handle_body_origin(&self, at_width: i32) -> (i32, i32) {
        (self.name_origin.0 + at_width, self.handle_y)
    }
}

fn text_width(font: &FontVec, px: i32, text: &str) -> i32 {
    text_size(PxScale::from(px as f32), font, text).0 as i32
}

pub struct OverlayCompositor {
    fonts: FontSet,
    badge: Option<RgbaImage>,
}

impl OverlayCompositor {
    pub fn new(fonts: FontSet, badge: Option<RgbaImage>) -> Self {
        Self { fonts, badge }
    }

    /// Load fonts and the badge image once per run.
    pub fn load(assets: &AssetSettings) -> Self {
        let badge = match load_rgba(&assets.badge_path) {
            Ok(badge) => Some(badge),
            Err(e) => {
                log::warn!("verification badge unavailable: {:#}", e);
                None
            }
        };
        Self::new(FontSet::load(&assets.fonts_dir), badge)
    }

    pub fn render(
        &self,
        branding: &BrandingConfig,
        dims: VideoDimensions,
        layout: &ResolvedLayout,
        logo_path: Option<&Path>,
    ) -> RgbaImage {
        let mut canvas = RgbaImage::new(dims.width, dims.height);
        if dims.is_empty() {
            return canvas;
        }
        let plan = arrange(layout, dims);
        let m = &layout.metrics;

        if let Some((top, height)) = plan.banner {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(0, top as i32).of_size(dims.width, height),
                branding.background,
            );
        }

        self.draw_logo(&mut canvas, logo_path, plan.logo_origin, plan.logo_size);

        let Some(bold) = self.fonts.bold() else {
            log::warn!("no fonts loaded; overlay text skipped");
            return canvas;
        };

        let (name_x, name_y) = plan.name_origin;
        let mut name_width = 0;
        if m.name_font > 0 {
            let scale = PxScale::from(m.name_font as f32);
            draw_text_mut(&mut canvas, branding.name_color, name_x, name_y, scale, bold, &branding.name);
            name_width = text_width(bold, m.name_font, &branding.name);
        }

        if let Some(badge) = self.badge.as_ref().filter(|_| plan.badge_size > 0) {
            let size = plan.badge_size as u32;
            let badge = imageops::resize(badge, size, size, FilterType::Lanczos3);
            let (x, y) = plan.badge_origin(name_width);
            imageops::overlay(&mut canvas, &badge, x as i64, y as i64);
        }

        let handle = branding.bare_handle();
        if !handle.is_empty() && m.handle_font > 0 {
            let face = self.fonts.light().unwrap_or(bold);
            let at_px = m.handle_font + AT_SIGN_BOOST;
            draw_text_mut(
                &mut canvas,
                branding.handle_color,
                name_x,
                plan.handle_y,
                PxScale::from(at_px as f32),
                face,
                "@",
            );
            let (x, y) = plan.handle_body_origin(text_width(face, at_px, "@"));
            draw_text_mut(
                &mut canvas,
                branding.handle_color,
                x,
                y,
                PxScale::from(m.handle_font as f32),
                face,
                handle,
            );
        }

        if m.headline_font > 0 {
            let face = self.fonts.regular().unwrap_or(bold);
            let scale = PxScale::from(m.headline_font as f32);
            for (x, y, line) in &plan.headline {
                draw_text_mut(&mut canvas, branding.headline_color, *x, *y, scale, face, line);
            }
        }

        canvas
    }

    fn draw_logo(&self, canvas: &mut RgbaImage, logo_path: Option<&Path>, origin: (i32, i32), size: i32) {
        if size <= 0 {
            return;
        }
        let radius = size / 2;
        let center = (origin.0 + radius, origin.1 + radius);
        let rim = ((size as f64 * RIM_FRACTION) as i32).max(1);

        let logo = logo_path.and_then(|path| match load_rgba(path) {
            Ok(logo) => Some(logo),
            Err(e) => {
                log::warn!("logo unusable, drawing placeholder: {:#}", e);
                None
            }
        });

        match logo {
            Some(logo) => {
                let masked = circular_crop(&logo, size as u32);
                imageops::overlay(canvas, &masked, origin.0 as i64, origin.1 as i64);
                draw_ring(canvas, center, radius, rim, RIM_COLOR);
            }
            None => draw_ring(canvas, center, radius, rim, PLACEHOLDER_COLOR),
        }
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("decode {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// Fill a `size`x`size` square from the image centre and clear everything
/// outside the inscribed circle.
fn circular_crop(logo: &RgbaImage, size: u32) -> RgbaImage {
    let mut out = image::DynamicImage::ImageRgba8(logo.clone())
        .resize_to_fill(size, size, FilterType::Lanczos3)
        .to_rgba8();
    let r = size as f64 / 2.0;
    for (x, y, px) in out.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - r;
        let dy = y as f64 + 0.5 - r;
        if dx * dx + dy * dy > r * r {
            px.0[3] = 0;
        }
    }
    out
}

fn draw_ring(canvas: &mut RgbaImage, center: (i32, i32), radius: i32, thickness: i32, color: Rgba<u8>) {
    for t in 0..thickness {
        let r = radius - t;
        if r <= 0 {
            break;
        }
        draw_hollow_circle_mut(canvas, center, r, color);
    }
}
