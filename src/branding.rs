//! Per-job branding configuration.
//!
//! The job database stores the configuration front end's form values
//! verbatim: camelCase keys, numbers that may arrive as strings and booleans
//! that usually arrive as `"true"`/`"false"`. `BrandingConfig` parses all of
//! that once per job and rejects malformed values instead of defaulting them.

use anyhow::{anyhow, Context, Result};
use image::Rgba;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

pub const AI_HEADLINE_PLACEHOLDER: &str = "AI Headline Pending...";

const DEFAULT_NAME: &str = "User";
const DEFAULT_BG_COLOR: &str = "#000000";
const DEFAULT_NAME_COLOR: &str = "#ffffff";
const DEFAULT_HANDLE_COLOR: &str = "#94a3b8";
const DEFAULT_HEADLINE_COLOR: &str = "#ffffff";
const DEFAULT_OPACITY_PERCENT: f64 = 100.0;
const DEFAULT_LOGO_SIZE_PERCENT: f64 = 15.0;
const DEFAULT_NAME_FONT_SIZE: f64 = 18.0;
const DEFAULT_BADGE_SIZE: f64 = 12.0;
const DEFAULT_HANDLE_FONT_SIZE: f64 = 14.0;
const DEFAULT_HEADLINE_FONT_SIZE: f64 = 24.0;

/// How the header overlay is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayMode {
    /// A user-supplied image is scaled and cropped onto the banner rectangle.
    Upload,
    /// The banner is composed from logo, name, badge, handle and headline.
    Design,
}

/// Where a reel's headline text comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadlineSource {
    /// Same literal text on every reel.
    Manual(String),
    /// Per-reel text produced upstream (`generated_headline`).
    Generated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrandingConfig {
    pub mode: OverlayMode,
    pub auto_detect: bool,
    pub show_headline: bool,
    /// Signed pixel offset added to the banner top after detection.
    pub vertical_correction: i32,
    pub headline: HeadlineSource,
    pub name: String,
    pub handle: String,
    /// Banner fill, opacity already folded into alpha.
    pub background: Rgba<u8>,
    /// Logo diameter as a percentage of video width.
    pub logo_size_percent: f64,
    /// Font and badge sizes are in design pixels at the 380px reference width.
    pub name_font_size: f64,
    pub name_color: Rgba<u8>,
    pub badge_size: f64,
    pub handle_font_size: f64,
    pub handle_color: Rgba<u8>,
    pub headline_font_size: f64,
    pub headline_color: Rgba<u8>,
}

impl BrandingConfig {
    /// Validate a job's `config` object. `null` is treated as an empty object.
    pub fn from_job_config(value: &serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Self::from_raw(RawBrandingConfig::default());
        }
        let raw: RawBrandingConfig =
            serde_json::from_value(value.clone()).context("invalid job config")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawBrandingConfig) -> Result<Self> {
        let mode = match non_empty(raw.mode).map(|m| m.to_ascii_lowercase()).as_deref() {
            None | Some("upload") => OverlayMode::Upload,
            Some("design") => OverlayMode::Design,
            Some(other) => return Err(anyhow!("mode must be 'upload' or 'design', got '{}'", other)),
        };

        let headline = match non_empty(raw.headline_mode)
            .map(|m| m.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("manual") => HeadlineSource::Manual(raw.manual_headline.unwrap_or_default()),
            Some("ai") => HeadlineSource::Generated,
            Some(other) => {
                return Err(anyhow!(
                    "headlineMode must be 'manual' or 'ai', got '{}'",
                    other
                ))
            }
        };

        let opacity = number_or(raw.design_opacity, "designOpacity", DEFAULT_OPACITY_PERCENT)?;
        if !(0.0..=100.0).contains(&opacity) {
            return Err(anyhow!("designOpacity must be within 0..=100, got {}", opacity));
        }
        let mut background = color_or(raw.design_bg_color, "designBgColor", DEFAULT_BG_COLOR)?;
        background.0[3] = (255.0 * opacity / 100.0).round() as u8;

        let logo_size_percent = number_or(raw.logo_size, "logoSize", DEFAULT_LOGO_SIZE_PERCENT)?;
        if !(logo_size_percent > 0.0 && logo_size_percent <= 100.0) {
            return Err(anyhow!(
                "logoSize must be within (0, 100], got {}",
                logo_size_percent
            ));
        }

        Ok(Self {
            mode,
            auto_detect: bool_or(raw.auto_detect_position, "autoDetectPosition", true)?,
            show_headline: bool_or(raw.show_headline, "showHeadline", true)?,
            vertical_correction: integer_or(raw.vertical_correction, "verticalCorrection", 0)?,
            headline,
            name: non_empty(raw.design_name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            handle: raw.design_handle.unwrap_or_default().trim().to_string(),
            background,
            logo_size_percent,
            name_font_size: size_or(raw.name_font_size, "nameFontSize", DEFAULT_NAME_FONT_SIZE)?,
            name_color: color_or(raw.name_color, "nameColor", DEFAULT_NAME_COLOR)?,
            badge_size: size_or(raw.badge_size, "badgeSize", DEFAULT_BADGE_SIZE)?,
            handle_font_size: size_or(
                raw.handle_font_size,
                "handleFontSize",
                DEFAULT_HANDLE_FONT_SIZE,
            )?,
            handle_color: color_or(raw.handle_color, "handleColor", DEFAULT_HANDLE_COLOR)?,
            headline_font_size: size_or(
                raw.headline_font_size,
                "headlineFontSize",
                DEFAULT_HEADLINE_FONT_SIZE,
            )?,
            headline_color: color_or(raw.headline_color, "headlineColor", DEFAULT_HEADLINE_COLOR)?,
        })
    }

    /// Headline to render for a reel, or `None` when hidden or empty.
    pub fn headline_for(&self, generated: Option<&str>) -> Option<String> {
        if !self.show_headline {
            return None;
        }
        let text = match &self.headline {
            HeadlineSource::Manual(text) => text.as_str(),
            HeadlineSource::Generated => generated
                .filter(|g| !g.trim().is_empty())
                .unwrap_or(AI_HEADLINE_PLACEHOLDER),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Handle without any leading `@`.
    pub fn bare_handle(&self) -> &str {
        self.handle.trim_start_matches('@')
    }
}

// ----------------------------------------------------------------------------
// Raw form values
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBrandingConfig {
    mode: Option<String>,
    auto_detect_position: Option<FlexBool>,
    show_headline: Option<FlexBool>,
    vertical_correction: Option<FlexNumber>,
    headline_mode: Option<String>,
    manual_headline: Option<String>,
    design_name: Option<String>,
    design_handle: Option<String>,
    design_bg_color: Option<String>,
    design_opacity: Option<FlexNumber>,
    logo_size: Option<FlexNumber>,
    name_font_size: Option<FlexNumber>,
    name_color: Option<String>,
    badge_size: Option<FlexNumber>,
    handle_font_size: Option<FlexNumber>,
    handle_color: Option<String>,
    headline_font_size: Option<FlexNumber>,
    headline_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexBool {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FlexNumber {
    fn to_f64(&self, key: &str) -> Result<f64> {
        let value = match self {
            FlexNumber::Int(v) => *v as f64,
            FlexNumber::Float(v) => *v,
            FlexNumber::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow!("{} must be a number, got '{}'", key, s))?,
        };
        if !value.is_finite() {
            return Err(anyhow!("{} must be finite", key));
        }
        Ok(value)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean that may be stringified. Anything but true/false is an error.
fn bool_or(value: Option<FlexBool>, key: &str, default: bool) -> Result<bool> {
    match value {
        None => Ok(default),
        Some(FlexBool::Bool(b)) => Ok(b),
        Some(FlexBool::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(anyhow!("{} must be true or false, got '{}'", key, s)),
        },
    }
}

fn number_or(value: Option<FlexNumber>, key: &str, default: f64) -> Result<f64> {
    value.map_or(Ok(default), |v| v.to_f64(key))
}

fn size_or(value: Option<FlexNumber>, key: &str, default: f64) -> Result<f64> {
    let size = number_or(value, key, default)?;
    if size <= 0.0 {
        return Err(anyhow!("{} must be positive, got {}", key, size));
    }
    Ok(size)
}

fn integer_or(value: Option<FlexNumber>, key: &str, default: i32) -> Result<i32> {
    let Some(value) = value else {
        return Ok(default);
    };
    let parsed = match value {
        FlexNumber::Int(v) => v,
        FlexNumber::Float(v) if v.is_finite() => v.trunc() as i64,
        FlexNumber::Float(_) => return Err(anyhow!("{} must be finite", key)),
        FlexNumber::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| anyhow!("{} must be an integer, got '{}'", key, s))?,
    };
    i32::try_from(parsed).map_err(|_| anyhow!("{} is out of range: {}", key, parsed))
}

fn color_or(value: Option<String>, key: &str, default: &str) -> Result<Rgba<u8>> {
    let raw = non_empty(value).unwrap_or_else(|| default.to_string());
    parse_hex_color(&raw).with_context(|| format!("invalid {}", key))
}

/// Parse `#rrggbb` (leading `#` optional) into an opaque colour.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
    let re = HEX_COLOR.get_or_init(|| {
        Regex::new(r"^#?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").unwrap()
    });
    let caps = re
        .captures(value.trim())
        .ok_or_else(|| anyhow!("expected a #rrggbb colour, got '{}'", value))?;
    let channel = |i: usize| u8::from_str_radix(&caps[i], 16).map_err(anyhow::Error::from);
    Ok(Rgba([channel(1)?, channel(2)?, channel(3)?, 255]))
}
