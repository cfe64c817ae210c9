//! Font loading, text measurement and line wrapping.
//!
//! A face loaded from a TTF/OTF file is measured with real glyph advances
//! via `ttf-parser`. Without one we fall back to a width heuristic that
//! treats CJK and full-width characters as one em wide, which is close
//! enough for page estimation.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub const REGULAR: FontKey = FontKey {
        bold: false,
        italic: false,
    };
}

/// Manages the faces used for measuring and rasterizing resume text.
#[derive(Clone, Default)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF face from bytes for the given style.
    pub fn load_font(&mut self, key: FontKey, bytes: Vec<u8>) -> Result<()> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::Font(format!("failed to parse font: {e}")))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        log::debug!(
            "loaded font face bold={} italic={} ({} bytes)",
            key.bold,
            key.italic,
            data.bytes.len()
        );
        self.fonts.insert(key, data);
        Ok(())
    }

    /// Load the regular face from a file on disk.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_font(FontKey::REGULAR, bytes)
    }

    /// Font data for a style, falling back to the regular face.
    pub fn get(&self, key: FontKey) -> Option<&FontData> {
        self.fonts
            .get(&key)
            .or_else(|| self.fonts.get(&FontKey::REGULAR))
    }

    /// True when at least a regular face with real outlines is loaded.
    pub fn has_real_fonts(&self) -> bool {
        self.fonts.contains_key(&FontKey::REGULAR)
    }

    /// Width of `text` in px at `font_size`.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, italic: bool) -> f32 {
        let Some(data) = self.get(FontKey { bold, italic }) else {
            return text
                .chars()
                .map(|c| heuristic_advance(c, bold))
                .sum::<f32>()
                * font_size;
        };

        let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) else {
            return text.chars().map(|c| heuristic_advance(c, bold)).sum::<f32>() * font_size;
        };
        let scale = font_size / data.units_per_em;
        text.chars()
            .map(|ch| match face.glyph_index(ch) {
                Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                None => heuristic_advance(ch, bold) * font_size,
            })
            .sum()
    }

    /// Distance from the top of a line box to the baseline.
    pub fn ascender_px(&self, font_size: f32, line_height_px: f32) -> f32 {
        let ascent = match self.get(FontKey::REGULAR) {
            Some(data) if data.units_per_em > 0.0 => data.ascender / data.units_per_em * font_size,
            _ => font_size * 0.8,
        };
        // Half-leading above the glyph box, as browsers lay out inline text.
        let descent = match self.get(FontKey::REGULAR) {
            Some(data) if data.units_per_em > 0.0 => -data.descender / data.units_per_em * font_size,
            _ => font_size * 0.2,
        };
        let leading = (line_height_px - (ascent + descent)).max(0.0);
        leading / 2.0 + ascent
    }
}

/// Advance of one character in ems when no face is loaded.
fn heuristic_advance(c: char, bold: bool) -> f32 {
    if c == ' ' || c == '\u{00A0}' {
        0.28
    } else if is_wide(c) {
        1.0
    } else if bold {
        0.55
    } else {
        0.5
    }
}

/// CJK ideographs, kana, hangul and full-width forms. These may break a
/// line between any two characters.
pub fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x2FFFD)
}

/// One styled piece of text to be wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledRun {
    pub text: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
}

/// A piece of a run placed on a wrapped line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSegment {
    /// Index into the input runs.
    pub run: usize,
    pub text: String,
    pub x: f32,
    pub width: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrappedLine {
    pub segments: Vec<LineSegment>,
    pub width: f32,
}

/// Break text into wrap opportunities: words, whitespace runs and single
/// wide characters.
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None::<usize>;
    let mut in_space = false;

    for (i, c) in text.char_indices() {
        if is_wide(c) {
            if let Some(s) = start.take() {
                tokens.push(&text[s..i]);
            }
            tokens.push(&text[i..i + c.len_utf8()]);
            continue;
        }
        let space = c.is_whitespace();
        match start {
            Some(s) if space != in_space => {
                tokens.push(&text[s..i]);
                start = Some(i);
            }
            None => start = Some(i),
            _ => {}
        }
        in_space = space;
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

/// Greedy-wrap styled runs into lines no wider than `max_width`.
///
/// Whitespace collapses to a single space and is dropped at line starts.
/// A token wider than the line is placed alone and overflows.
pub fn wrap_runs(runs: &[StyledRun], max_width: f32, fonts: &FontManager) -> Vec<WrappedLine> {
    let mut lines = Vec::new();
    let mut line = WrappedLine::default();

    for (run_index, run) in runs.iter().enumerate() {
        for token in tokenize(&run.text) {
            let is_space = token.chars().all(char::is_whitespace);
            let text = if is_space { " " } else { token };
            if is_space && line.segments.is_empty() {
                continue;
            }
            let w = fonts.measure_text_width(text, run.font_size, run.bold, run.italic);

            if !is_space && line.width + w > max_width && !line.segments.is_empty() {
                trim_trailing_space(&mut line, runs, fonts);
                lines.push(std::mem::take(&mut line));
            }

            match line.segments.last_mut() {
                Some(seg) if seg.run == run_index => {
                    seg.text.push_str(text);
                    seg.width += w;
                }
                _ => line.segments.push(LineSegment {
                    run: run_index,
                    text: text.to_string(),
                    x: line.width,
                    width: w,
                }),
            }
            line.width += w;
        }
    }

    if !line.segments.is_empty() {
        trim_trailing_space(&mut line, runs, fonts);
        lines.push(line);
    }
    lines
}

fn trim_trailing_space(line: &mut WrappedLine, runs: &[StyledRun], fonts: &FontManager) {
    let Some(seg) = line.segments.last_mut() else {
        return;
    };
    if seg.text.ends_with(' ') {
        let run = &runs[seg.run];
        let w = fonts.measure_text_width(" ", run.font_size, run.bold, run.italic);
        seg.text.pop();
        seg.width -= w;
        line.width -= w;
        if seg.text.is_empty() {
            line.segments.pop();
        }
    }
}
