//! Rasterizer – paints laid-out blocks into RGBA pixmaps with tiny-skia.
//!
//! Text is drawn from glyph outlines of the loaded faces. Without a loaded
//! face each text segment becomes a grey bar of the same extent, which keeps
//! exports deterministic and the block geometry visible.

use std::io::Cursor;

use log::debug;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Transform};
use ttf_parser::{Face, OutlineBuilder};

use crate::error::{Error, Result};
use crate::fonts::{FontKey, FontManager};
use crate::layout::{DocumentLayout, LaidOutBlock, PlacedSegment};
use crate::layout_config::{PrintLayout, PrintPage};
use crate::preview::Tone;

/// Rasterize the whole container in unbroken flow.
pub fn rasterize_continuous(layout: &DocumentLayout, fonts: &FontManager, scale: f32) -> Result<Pixmap> {
    let mut pixmap = blank(layout.width, layout.height, scale)?;
    let transform = Transform::from_scale(scale, scale);
    for block in &layout.blocks {
        paint_block(&mut pixmap, block, 0.0, fonts, transform);
    }
    debug!(
        "Rasterized continuous document {}x{}",
        pixmap.width(),
        pixmap.height()
    );
    Ok(pixmap)
}

/// Rasterize one physical page of a print layout.
pub fn rasterize_page(
    layout: &DocumentLayout,
    print: &PrintLayout,
    page: &PrintPage,
    fonts: &FontManager,
    scale: f32,
) -> Result<Pixmap> {
    let mut pixmap = blank(print.page_width_px, print.page_height_px, scale)?;
    let transform = Transform::from_scale(scale, scale);
    for placed in &page.blocks {
        let block = layout.blocks.get(placed.block_index).ok_or_else(|| {
            Error::Raster(format!(
                "page {} refers to missing block {}",
                page.page_index, placed.block_index
            ))
        })?;
        paint_block(&mut pixmap, block, placed.y - block.top, fonts, transform);
    }
    Ok(pixmap)
}

/// Encode a pixmap as PNG.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    // Pixmaps start opaque white, so premultiplied and straight alpha agree.
    let img = image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or_else(|| Error::Raster("pixmap buffer size mismatch".to_string()))?;
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| Error::Raster(format!("png encode failed: {e}")))?;
    Ok(bytes)
}

fn blank(width: f32, height: f32, scale: f32) -> Result<Pixmap> {
    let w = (width * scale).ceil().max(1.0) as u32;
    let h = (height * scale).ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| Error::Raster(format!("invalid raster size {w}x{h}")))?;
    pixmap.fill(tiny_skia::Color::WHITE);
    Ok(pixmap)
}

fn paint_for(tone: Tone) -> Paint<'static> {
    let [r, g, b] = tone.rgb();
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    paint
}

fn paint_block(pixmap: &mut Pixmap, block: &LaidOutBlock, dy: f32, fonts: &FontManager, transform: Transform) {
    for rect in &block.rects {
        if let Some(r) = Rect::from_xywh(rect.x, rect.y + dy, rect.width, rect.height) {
            pixmap.fill_rect(r, &paint_for(rect.tone), transform, None);
        }
    }

    for line in &block.lines {
        for segment in &line.segments {
            if fonts.has_real_fonts() {
                draw_glyphs(pixmap, segment, line.baseline + dy, fonts, transform);
            } else {
                let bar_height = (line.height * 0.4).max(1.0);
                let bar_top = line.y + dy + (line.height - bar_height) / 2.0;
                let Some(r) = Rect::from_xywh(segment.x, bar_top, segment.width, bar_height) else {
                    continue;
                };
                let mut paint = paint_for(segment.tone);
                if segment.tone != Tone::Inverse {
                    paint.set_color_rgba8(0xc8, 0xcc, 0xd2, 255);
                }
                pixmap.fill_rect(r, &paint, transform, None);
            }
        }
    }
}

fn draw_glyphs(pixmap: &mut Pixmap, segment: &PlacedSegment, baseline: f32, fonts: &FontManager, transform: Transform) {
    let key = FontKey {
        bold: segment.bold,
        italic: segment.italic,
    };
    let Some(data) = fonts.get(key) else {
        return;
    };
    let Ok(face) = Face::parse(&data.bytes, 0) else {
        return;
    };
    let scale = segment.font_size / data.units_per_em;
    let paint = paint_for(segment.tone);

    let mut x = segment.x;
    let mut buf = [0u8; 4];
    for ch in segment.text.chars() {
        let Some(gid) = face.glyph_index(ch) else {
            x += fonts.measure_text_width(ch.encode_utf8(&mut buf), segment.font_size, segment.bold, segment.italic);
            continue;
        };
        let mut pen = GlyphPen::new(x, baseline, scale);
        if face.outline_glyph(gid, &mut pen).is_some() {
            if let Some(path) = pen.finish() {
                pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
            }
        }
        x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
    }
}

/// Collects a glyph outline (font units, y up) as a path in container
/// pixels (y down) anchored at a baseline origin.
struct GlyphPen {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPen {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn x(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale
    }

    fn y(&self, y: f32) -> f32 {
        self.origin_y - y * self.scale
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPen {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1, x, y) = (self.x(x1), self.y(y1), self.x(x), self.y(y));
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = (self.x(x1), self.y(y1));
        let (x2, y2) = (self.x(x2), self.y(y2));
        let (x, y) = (self.x(x), self.y(y));
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout_document;
    use crate::model::ResumeData;
    use crate::pagination::paginate_for_print;
    use crate::preview::render_document;
    use crate::sections::SectionRegistry;
    use crate::settings::LayoutSettings;

    fn sample_layout() -> DocumentLayout {
        let rendered = render_document(&ResumeData::default(), &SectionRegistry::default());
        layout_document(&rendered, &LayoutSettings::default(), &FontManager::default()).unwrap()
    }

    #[test]
    fn continuous_raster_matches_container_at_scale() {
        let layout = sample_layout();
        let pixmap = rasterize_continuous(&layout, &FontManager::default(), 2.0).unwrap();
        assert_eq!(pixmap.width(), (layout.width * 2.0).ceil() as u32);
        assert_eq!(pixmap.height(), (layout.height * 2.0).ceil() as u32);
    }

    #[test]
    fn page_raster_is_a4() {
        let layout = sample_layout();
        let print = paginate_for_print(&layout, "t");
        let pixmap =
            rasterize_page(&layout, &print, &print.pages[0], &FontManager::default(), 1.0).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (794, 1123));
        // Something other than white was painted.
        assert!(pixmap.pixels().iter().any(|p| p.red() < 200));
    }

    #[test]
    fn missing_block_is_an_error() {
        let layout = sample_layout();
        let mut print = paginate_for_print(&layout, "t");
        print.pages[0].blocks[0].block_index = 999;
        let page = print.pages[0].clone();
        let err = rasterize_page(&layout, &print, &page, &FontManager::default(), 1.0);
        assert!(matches!(err, Err(Error::Raster(_))));
    }

    #[test]
    fn png_has_signature() {
        let pixmap = blank(10.0, 10.0, 1.0).unwrap();
        let png = encode_png(&pixmap).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
