//! Layout settings and the A4 page geometry derived from them.
//!
//! All preview geometry is expressed in CSS pixels at 96 DPI. The physical
//! page is A4 (210mm × 297mm); the user only chooses the margin, the base
//! font size and the line-height multiple, each from a small discrete set.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A4 page height in millimetres.
pub const A4_HEIGHT_MM: f32 = 297.0;
/// A4 page width in millimetres.
pub const A4_WIDTH_MM: f32 = 210.0;
/// A4 page height in CSS pixels (297mm at 96 DPI, rounded).
pub const PAGE_PIXEL_HEIGHT: f32 = 1123.0;
/// A4 page width in CSS pixels (210mm at 96 DPI, rounded).
pub const PAGE_PIXEL_WIDTH: f32 = 794.0;
/// Visual gap between simulated pages in the screen preview.
pub const DEFAULT_PAGE_GAP_PX: f32 = 24.0;

pub const FONT_SIZE_RANGE: (u8, u8) = (10, 18);
pub const LINE_HEIGHT_RANGE: (f32, f32) = (1.0, 2.0);
pub const PAGE_PADDING_RANGE: (u8, u8) = (10, 24);
pub const PAGE_PADDING_STEP: u8 = 2;

/// Pixels per millimetre, derived from the page height constant.
pub fn px_per_mm() -> f32 {
    PAGE_PIXEL_HEIGHT / A4_HEIGHT_MM
}

/// Convert millimetres to preview pixels.
pub fn mm_to_px(mm: f32) -> f32 {
    mm * px_per_mm()
}

/// User-configurable typography and margin settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    /// Base font size in px.
    pub font_size: u8,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    /// Page margin in mm, applied on all four sides.
    pub page_padding: u8,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            font_size: 14,
            line_height: 1.4,
            page_padding: 20,
        }
    }
}

impl LayoutSettings {
    /// Every allowed font size.
    pub fn font_sizes() -> impl Iterator<Item = u8> {
        FONT_SIZE_RANGE.0..=FONT_SIZE_RANGE.1
    }

    /// Every allowed line-height multiple (tenths).
    pub fn line_heights() -> impl Iterator<Item = f32> {
        (10u8..=20).map(|tenths| tenths as f32 / 10.0)
    }

    /// Every allowed page padding in mm.
    pub fn page_paddings() -> impl Iterator<Item = u8> {
        (PAGE_PADDING_RANGE.0..=PAGE_PADDING_RANGE.1).step_by(PAGE_PADDING_STEP as usize)
    }

    /// Build settings, rejecting any value outside its enumerated set.
    pub fn new(font_size: u8, line_height: f32, page_padding: u8) -> Result<Self> {
        let settings = Self {
            font_size,
            line_height,
            page_padding,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !Self::font_sizes().any(|v| v == self.font_size) {
            return Err(Error::InvalidSetting(format!(
                "font size {}px is not in {}..={}",
                self.font_size, FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1
            )));
        }
        if !Self::line_heights().any(|v| (v - self.line_height).abs() < 1e-3) {
            return Err(Error::InvalidSetting(format!(
                "line height {} is not a tenth in {}..={}",
                self.line_height, LINE_HEIGHT_RANGE.0, LINE_HEIGHT_RANGE.1
            )));
        }
        if !Self::page_paddings().any(|v| v == self.page_padding) {
            return Err(Error::InvalidSetting(format!(
                "page padding {}mm is not an even value in {}..={}",
                self.page_padding, PAGE_PADDING_RANGE.0, PAGE_PADDING_RANGE.1
            )));
        }
        Ok(())
    }

    /// Snap every field to the nearest allowed value.
    pub fn snapped(self) -> Self {
        StoredSettings::from(self).snapped()
    }

    /// Page margin in preview pixels.
    pub fn padding_px(&self) -> f32 {
        mm_to_px(self.page_padding as f32)
    }

    /// Height of one text line in px.
    pub fn line_height_px(&self) -> f32 {
        self.font_size as f32 * self.line_height
    }

    /// Geometry of the simulated pages for these settings.
    pub fn page_geometry(&self, page_gap_px: f32) -> PageGeometry {
        PageGeometry::new(PAGE_PIXEL_HEIGHT, page_gap_px, self.padding_px())
    }
}

/// Settings as read back from storage: any number is accepted, then
/// [`snapped`](StoredSettings::snapped) to the allowed sets. Missing fields
/// take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSettings {
    pub font_size: f32,
    pub line_height: f32,
    pub page_padding: f32,
}

impl Default for StoredSettings {
    fn default() -> Self {
        LayoutSettings::default().into()
    }
}

impl From<LayoutSettings> for StoredSettings {
    fn from(s: LayoutSettings) -> Self {
        Self {
            font_size: s.font_size as f32,
            line_height: s.line_height,
            page_padding: s.page_padding as f32,
        }
    }
}

impl StoredSettings {
    pub fn snapped(self) -> LayoutSettings {
        let defaults = LayoutSettings::default();

        let font_size = if self.font_size.is_finite() {
            self.font_size
                .round()
                .clamp(FONT_SIZE_RANGE.0 as f32, FONT_SIZE_RANGE.1 as f32) as u8
        } else {
            defaults.font_size
        };

        let line_height = if self.line_height.is_finite() {
            ((self.line_height.clamp(LINE_HEIGHT_RANGE.0, LINE_HEIGHT_RANGE.1) * 10.0).round())
                / 10.0
        } else {
            defaults.line_height
        };

        let page_padding = if self.page_padding.is_finite() {
            let clamped = self
                .page_padding
                .clamp(PAGE_PADDING_RANGE.0 as f32, PAGE_PADDING_RANGE.1 as f32);
            LayoutSettings::page_paddings()
                .min_by(|a, b| {
                    (*a as f32 - clamped)
                        .abs()
                        .total_cmp(&(*b as f32 - clamped).abs())
                })
                .unwrap_or(defaults.page_padding)
        } else {
            defaults.page_padding
        };

        LayoutSettings {
            font_size,
            line_height,
            page_padding,
        }
    }
}

/// Pixel geometry of a simulated physical page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_height_px: f32,
    pub page_gap_px: f32,
    pub container_top_padding_px: f32,
}

impl PageGeometry {
    /// Clamps to `page_height_px >= 1` and `page_gap_px >= 0`.
    pub fn new(page_height_px: f32, page_gap_px: f32, container_top_padding_px: f32) -> Self {
        Self {
            page_height_px: finite_or(page_height_px, PAGE_PIXEL_HEIGHT).max(1.0),
            page_gap_px: finite_or(page_gap_px, 0.0).max(0.0),
            container_top_padding_px: finite_or(container_top_padding_px, 0.0).max(0.0),
        }
    }

    /// Distance from one page's top to the next page's top.
    pub fn stride(&self) -> f32 {
        self.page_height_px + self.page_gap_px
    }

    pub fn page_top(&self, page_index: usize) -> f32 {
        page_index as f32 * self.stride()
    }

    pub fn page_bottom(&self, page_index: usize) -> f32 {
        self.page_top(page_index) + self.page_height_px
    }

    /// Where content begins on a page: page top plus the container padding.
    pub fn content_top(&self, page_index: usize) -> f32 {
        self.page_top(page_index) + self.container_top_padding_px
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        LayoutSettings::default().page_geometry(DEFAULT_PAGE_GAP_PX)
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}
