//! Headline text layout.
//!
//! Font metrics are not available when sizing the banner, so wrapping uses a
//! fixed average character width of half the font size. The layout computed
//! here is measured once by the resolver and rendered as-is by the compositor.

use crate::layout::DesignMetrics;

/// Average glyph advance as a fraction of font size.
pub const AVG_CHAR_WIDTH_FACTOR: f64 = 0.5;
/// Baseline-to-baseline distance as a fraction of font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextLayout {
    pub lines: Vec<String>,
    /// Characters allowed per line. Zero means nothing fits and the text is
    /// kept on one line.
    pub max_chars: usize,
    pub line_advance: i32,
}

impl TextLayout {
    pub fn wrap(text: &str, metrics: &DesignMetrics) -> Self {
        let max_chars = char_budget(metrics.width, metrics.text_inset_x, metrics.headline_font);
        let lines = wrap_words(text, max_chars);
        if max_chars == 0 && !lines.is_empty() {
            log::warn!(
                "headline does not fit {}px at font size {}; keeping it on one line",
                metrics.width,
                metrics.headline_font
            );
        }
        Self {
            lines,
            max_chars,
            line_advance: (metrics.headline_font as f64 * LINE_HEIGHT_FACTOR) as i32,
        }
    }

    /// Total height of all lines.
    pub fn height(&self) -> i32 {
        self.lines.len() as i32 * self.line_advance
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Characters per line for text inset by `inset_x` on both sides.
pub fn char_budget(width: u32, inset_x: i32, font_size: i32) -> usize {
    let avg_char_width = font_size as f64 * AVG_CHAR_WIDTH_FACTOR;
    if avg_char_width <= 0.0 {
        return 0;
    }
    let usable = width as f64 - 2.0 * inset_x as f64;
    if usable <= 0.0 {
        return 0;
    }
    (usable / avg_char_width) as usize
}

/// Greedy word wrap. Whitespace runs collapse to one space; a word longer
/// than the budget fills the rest of the current line and continues in
/// budget-sized pieces. A zero budget yields a single line.
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![words.join(" ")];
    }

    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0usize;

    for word in words {
        let chars: Vec<char> = word.chars().collect();
        let sep = usize::from(line_len > 0);

        if line_len + sep + chars.len() <= max_chars {
            if sep == 1 {
                line.push(' ');
            }
            line.extend(chars.iter());
            line_len += sep + chars.len();
            continue;
        }

        if chars.len() <= max_chars {
            lines.push(std::mem::take(&mut line));
            line.extend(chars.iter());
            line_len = chars.len();
            continue;
        }

        let mut rest = &chars[..];
        if line_len > 0 {
            let space = max_chars.saturating_sub(line_len + 1);
            if space > 0 {
                line.push(' ');
                line.extend(rest[..space].iter());
                rest = &rest[space..];
            }
            lines.push(std::mem::take(&mut line));
        }
        while rest.len() > max_chars {
            lines.push(rest[..max_chars].iter().collect());
            rest = &rest[max_chars..];
        }
        line = rest.iter().collect();
        line_len = rest.len();
    }

    if line_len > 0 {
        lines.push(line);
    }
    lines
}
