//! Layout engine – uses Taffy to stack rendered blocks in an A4-wide
//! container, then flattens the result into absolutely positioned text lines
//! and filled rectangles per block.
//!
//! All coordinates are container pixels: `(0, 0)` is the top-left corner of
//! the container, outside its padding. Block tops therefore start at the
//! page padding, which is what the pagination engine expects.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::error::{Error, Result};
use crate::fonts::{wrap_runs, FontManager, StyledRun};
use crate::pagination::BlockGeometry;
use crate::preview::{Block, Element, RenderedDocument, TextSpan, Tone};
use crate::richtext::{BlockStyle, RichText};
use crate::settings::{LayoutSettings, PAGE_PIXEL_WIDTH};

const COLUMN_GAP: f32 = 16.0;
const DATE_COLUMN_MIN: f32 = 180.0;
const LIST_INDENT: f32 = 16.0;
const LIST_ITEM_GAP: f32 = 4.0;
const HEADING_MARGIN_TOP: f32 = 16.0;
const HEADING_MARGIN_BOTTOM: f32 = 8.0;
const HEADING_RULE: f32 = 2.0;
const LABEL_PADDING: (f32, f32, f32, f32) = (4.0, 64.0, 4.0, 24.0);
const LABEL_SHADE_OFFSET: f32 = 6.0;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A run of text placed on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSegment {
    pub text: String,
    pub x: f32,
    pub width: f32,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub tone: Tone,
    pub link: Option<String>,
}

/// One line box. `baseline` is absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub y: f32,
    pub height: f32,
    pub baseline: f32,
    pub segments: Vec<PlacedSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutBlock {
    pub id: String,
    pub top: f32,
    /// Border-box height, without the spacing below the block.
    pub height: f32,
    pub lines: Vec<PlacedLine>,
    /// Painted in order, before the lines.
    pub rects: Vec<PlacedRect>,
}

impl LaidOutBlock {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub width: f32,
    /// Total container height including padding.
    pub height: f32,
    pub padding: f32,
    pub blocks: Vec<LaidOutBlock>,
}

impl DocumentLayout {
    /// Natural block geometry in document order.
    pub fn block_geometry(&self) -> Vec<BlockGeometry> {
        self.blocks
            .iter()
            .map(|b| BlockGeometry::new(b.top, b.height))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// A line measured at build time, x relative to its leaf.
#[derive(Debug, Clone)]
struct TextLine {
    height: f32,
    ascent: f32,
    segments: Vec<PlacedSegment>,
}

#[derive(Debug, Clone)]
enum NodeContent {
    Text(Vec<TextLine>),
    /// Heading label: shade offset to the right, then the black box.
    Label,
    Fill(Tone),
    /// List marker drawn in the indent left of the item.
    Marker(TextLine),
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    settings: &'a LayoutSettings,
    content: HashMap<NodeId, NodeContent>,
}

fn layout_err(e: taffy::TaffyError) -> Error {
    Error::Layout(e.to_string())
}

fn margin(top: f32, bottom: f32) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(top),
        right: LengthPercentageAuto::Length(0.0),
        bottom: LengthPercentageAuto::Length(bottom),
        left: LengthPercentageAuto::Length(0.0),
    }
}

fn column() -> Style {
    Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        ..Default::default()
    }
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, settings: &'a LayoutSettings) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            settings,
            content: HashMap::new(),
        }
    }

    fn base_size(&self) -> f32 {
        self.settings.font_size as f32
    }

    /// Wrap spans to `max_width` without creating a node.
    fn wrap(&self, spans: &[TextSpan], max_width: f32) -> Vec<TextLine> {
        let base = self.base_size();
        let runs: Vec<StyledRun> = spans
            .iter()
            .map(|s| StyledRun {
                text: s.text.clone(),
                font_size: base * s.scale,
                bold: s.bold,
                italic: s.italic,
            })
            .collect();
        let max_scale = spans.iter().map(|s| s.scale).fold(0.0f32, f32::max);
        let font_size = base * max_scale.max(f32::EPSILON);
        let height = font_size * self.settings.line_height;
        let ascent = self.fonts.ascender_px(font_size, height);

        wrap_runs(&runs, max_width, self.fonts)
            .into_iter()
            .map(|line| TextLine {
                height,
                ascent,
                segments: line
                    .segments
                    .into_iter()
                    .map(|seg| {
                        let span = &spans[seg.run];
                        PlacedSegment {
                            text: seg.text,
                            x: seg.x,
                            width: seg.width,
                            font_size: runs[seg.run].font_size,
                            bold: span.bold,
                            italic: span.italic,
                            tone: span.tone,
                            link: span.link.clone(),
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    fn text_leaf(&mut self, lines: Vec<TextLine>) -> Result<NodeId> {
        let width = lines
            .iter()
            .map(|l| l.segments.iter().map(|s| s.x + s.width).fold(0.0, f32::max))
            .fold(0.0f32, f32::max);
        let height: f32 = lines.iter().map(|l| l.height).sum();
        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Length(width),
                    height: Dimension::Length(height),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.content.insert(node, NodeContent::Text(lines));
        Ok(node)
    }

    fn paragraph(&mut self, spans: &[TextSpan], max_width: f32) -> Result<NodeId> {
        let lines = self.wrap(spans, max_width);
        self.text_leaf(lines)
    }

    fn build_block(&mut self, block: &Block, width: f32) -> Result<NodeId> {
        let mut children = Vec::with_capacity(block.elements.len());
        for element in &block.elements {
            children.push(self.build_element(element, width)?);
        }
        let style = Style {
            margin: margin(0.0, block.spacing_px),
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Auto,
            },
            ..column()
        };
        self.taffy
            .new_with_children(style, &children)
            .map_err(layout_err)
    }

    fn build_element(&mut self, element: &Element, width: f32) -> Result<NodeId> {
        match element {
            Element::Heading(title) => self.build_heading(title, width),
            Element::Paragraph { spans } => self.paragraph(spans, width),
            Element::Columns { left, right } => self.build_columns(left, right, width),
            Element::Rich(rich) => self.build_rich(rich, width),
        }
    }

    fn build_heading(&mut self, title: &str, width: f32) -> Result<NodeId> {
        let (pt, pr, pb, pl) = LABEL_PADDING;
        let span = TextSpan::new(title).bold().scale(1.1).tone(Tone::Inverse);
        let text = self.paragraph(&[span], (width - pl - pr).max(1.0))?;

        let label = self
            .taffy
            .new_with_children(
                Style {
                    padding: Rect {
                        top: LengthPercentage::Length(pt),
                        right: LengthPercentage::Length(pr),
                        bottom: LengthPercentage::Length(pb),
                        left: LengthPercentage::Length(pl),
                    },
                    align_self: Some(taffy::AlignSelf::FlexStart),
                    ..column()
                },
                &[text],
            )
            .map_err(layout_err)?;
        self.content.insert(label, NodeContent::Label);

        let rule = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: Dimension::Percent(1.0),
                    height: Dimension::Length(HEADING_RULE),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_err)?;
        self.content.insert(rule, NodeContent::Fill(Tone::Ink));

        self.taffy
            .new_with_children(
                Style {
                    margin: margin(HEADING_MARGIN_TOP, HEADING_MARGIN_BOTTOM),
                    ..column()
                },
                &[label, rule],
            )
            .map_err(layout_err)
    }

    fn build_columns(
        &mut self,
        left: &[Vec<TextSpan>],
        right: &[Vec<TextSpan>],
        width: f32,
    ) -> Result<NodeId> {
        let right_lines: Vec<Vec<TextLine>> = right
            .iter()
            .map(|spans| self.wrap(spans, f32::INFINITY))
            .collect();
        let right_width = right_lines
            .iter()
            .flatten()
            .map(|l| l.segments.iter().map(|s| s.x + s.width).fold(0.0, f32::max))
            .fold(DATE_COLUMN_MIN, f32::max)
            .min(width / 2.0);
        let left_width = (width - right_width - COLUMN_GAP).max(1.0);

        let mut left_nodes = Vec::with_capacity(left.len());
        for spans in left {
            left_nodes.push(self.paragraph(spans, left_width)?);
        }
        let left_col = self
            .taffy
            .new_with_children(
                Style {
                    flex_grow: 1.0,
                    flex_shrink: 1.0,
                    min_size: Size {
                        width: Dimension::Length(0.0),
                        height: Dimension::Auto,
                    },
                    ..column()
                },
                &left_nodes,
            )
            .map_err(layout_err)?;

        let mut right_nodes = Vec::with_capacity(right_lines.len());
        for lines in right_lines {
            right_nodes.push(self.text_leaf(lines)?);
        }
        let right_col = self
            .taffy
            .new_with_children(
                Style {
                    flex_shrink: 0.0,
                    align_items: Some(taffy::AlignItems::FlexEnd),
                    min_size: Size {
                        width: Dimension::Length(right_width),
                        height: Dimension::Auto,
                    },
                    ..column()
                },
                &right_nodes,
            )
            .map_err(layout_err)?;

        self.taffy
            .new_with_children(
                Style {
                    display: taffy::Display::Flex,
                    flex_direction: taffy::FlexDirection::Row,
                    gap: Size {
                        width: LengthPercentage::Length(COLUMN_GAP),
                        height: LengthPercentage::Length(0.0),
                    },
                    ..Default::default()
                },
                &[left_col, right_col],
            )
            .map_err(layout_err)
    }

    fn build_rich(&mut self, rich: &RichText, width: f32) -> Result<NodeId> {
        let mut children = Vec::with_capacity(rich.blocks.len());
        let mut counter = 0u32;

        for block in &rich.blocks {
            let spans: Vec<TextSpan> = block
                .runs
                .iter()
                .map(|run| {
                    let mut span = TextSpan::new(run.text.as_str());
                    span.bold = run.marks.bold;
                    span.italic = run.marks.italic;
                    span.link = run.marks.link.clone();
                    span
                })
                .collect();

            let marker = match block.style {
                BlockStyle::Paragraph => {
                    counter = 0;
                    children.push(self.paragraph(&spans, width)?);
                    continue;
                }
                BlockStyle::Bullet => {
                    counter = 0;
                    "\u{2022}".to_string()
                }
                BlockStyle::Ordered => {
                    counter += 1;
                    format!("{counter}.")
                }
            };

            let text = self.paragraph(&spans, (width - LIST_INDENT).max(1.0))?;
            let item = self
                .taffy
                .new_with_children(
                    Style {
                        padding: Rect {
                            top: LengthPercentage::Length(0.0),
                            right: LengthPercentage::Length(0.0),
                            bottom: LengthPercentage::Length(0.0),
                            left: LengthPercentage::Length(LIST_INDENT),
                        },
                        margin: margin(0.0, LIST_ITEM_GAP),
                        ..column()
                    },
                    &[text],
                )
                .map_err(layout_err)?;
            let marker_line = self
                .wrap(&[TextSpan::new(marker)], f32::INFINITY)
                .into_iter()
                .next();
            if let Some(line) = marker_line {
                self.content.insert(item, NodeContent::Marker(line));
            }
            children.push(item);
        }

        self.taffy
            .new_with_children(column(), &children)
            .map_err(layout_err)
    }

    /// Walk the computed tree below a block, collecting absolute paint items.
    fn extract(
        &self,
        node: NodeId,
        offset_x: f32,
        offset_y: f32,
        lines: &mut Vec<PlacedLine>,
        rects: &mut Vec<PlacedRect>,
    ) -> Result<()> {
        let layout = self.taffy.layout(node).map_err(layout_err)?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        match self.content.get(&node) {
            Some(NodeContent::Text(text_lines)) => {
                let mut line_y = y;
                for line in text_lines {
                    lines.push(place_line(line, x, line_y));
                    line_y += line.height;
                }
            }
            Some(NodeContent::Label) => {
                let (width, height) = (layout.size.width, layout.size.height);
                rects.push(PlacedRect {
                    x: x + LABEL_SHADE_OFFSET,
                    y,
                    width,
                    height,
                    tone: Tone::Shade,
                });
                rects.push(PlacedRect {
                    x,
                    y,
                    width,
                    height,
                    tone: Tone::Ink,
                });
            }
            Some(NodeContent::Fill(tone)) => rects.push(PlacedRect {
                x,
                y,
                width: layout.size.width,
                height: layout.size.height,
                tone: *tone,
            }),
            Some(NodeContent::Marker(line)) => lines.push(place_line(line, x, y)),
            None => {}
        }

        for child in self.taffy.children(node).map_err(layout_err)? {
            self.extract(child, x, y, lines, rects)?;
        }
        Ok(())
    }
}

fn place_line(line: &TextLine, x: f32, y: f32) -> PlacedLine {
    PlacedLine {
        y,
        height: line.height,
        baseline: y + line.ascent,
        segments: line
            .segments
            .iter()
            .map(|s| PlacedSegment {
                x: x + s.x,
                ..s.clone()
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out rendered blocks in an A4-wide container with the page padding on
/// every side.
pub fn layout_document(
    rendered: &RenderedDocument,
    settings: &LayoutSettings,
    fonts: &FontManager,
) -> Result<DocumentLayout> {
    let padding = settings.padding_px();
    let content_width = (PAGE_PIXEL_WIDTH - 2.0 * padding).max(1.0);
    let mut builder = LayoutBuilder::new(fonts, settings);

    let mut block_nodes = Vec::with_capacity(rendered.blocks.len());
    for block in &rendered.blocks {
        block_nodes.push(builder.build_block(block, content_width)?);
    }

    let root_style = Style {
        size: Size {
            width: Dimension::Length(PAGE_PIXEL_WIDTH),
            height: Dimension::Auto,
        },
        padding: Rect {
            top: LengthPercentage::Length(padding),
            right: LengthPercentage::Length(padding),
            bottom: LengthPercentage::Length(padding),
            left: LengthPercentage::Length(padding),
        },
        ..column()
    };
    let root = builder
        .taffy
        .new_with_children(root_style, &block_nodes)
        .map_err(layout_err)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(PAGE_PIXEL_WIDTH),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_err)?;

    let root_layout = builder.taffy.layout(root).map_err(layout_err)?;
    let height = root_layout.size.height;

    let mut blocks = Vec::with_capacity(block_nodes.len());
    for (block, &node) in rendered.blocks.iter().zip(&block_nodes) {
        let layout = builder.taffy.layout(node).map_err(layout_err)?;
        let (top, block_height) = (layout.location.y, layout.size.height);
        let mut lines = Vec::new();
        let mut rects = Vec::new();
        builder.extract(node, 0.0, 0.0, &mut lines, &mut rects)?;
        blocks.push(LaidOutBlock {
            id: block.id.clone(),
            top,
            height: block_height,
            lines,
            rects,
        });
    }

    log::debug!(
        "Laid out {} blocks, container height {:.1}px",
        blocks.len(),
        height
    );

    Ok(DocumentLayout {
        width: PAGE_PIXEL_WIDTH,
        height,
        padding,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResumeData;
    use crate::preview::render_document;
    use crate::sections::SectionRegistry;

    fn layout(doc: &ResumeData, settings: &LayoutSettings) -> DocumentLayout {
        let rendered = render_document(doc, &SectionRegistry::default());
        layout_document(&rendered, settings, &FontManager::default()).unwrap()
    }

    #[test]
    fn blocks_start_at_padding_and_stack() {
        let settings = LayoutSettings::default();
        let doc_layout = layout(&ResumeData::default(), &settings);
        let first = &doc_layout.blocks[0];
        assert!((first.top - settings.padding_px()).abs() < 0.01);
        for pair in doc_layout.blocks.windows(2) {
            assert!(pair[1].top >= pair[0].bottom());
        }
        let last = doc_layout.blocks.last().unwrap();
        assert!(doc_layout.height >= last.bottom() + settings.padding_px() - 0.01);
    }

    #[test]
    fn headings_paint_label_and_rule() {
        let doc_layout = layout(&ResumeData::default(), &LayoutSettings::default());
        let edu = doc_layout.blocks.iter().find(|b| b.id == "edu-1").unwrap();
        assert_eq!(edu.rects.len(), 3);
        assert_eq!(edu.rects[0].tone, Tone::Shade);
        assert!((edu.rects[2].height - HEADING_RULE).abs() < 0.01);
        let second = doc_layout.blocks.iter().find(|b| b.id == "edu-2").unwrap();
        assert!(second.rects.is_empty());
    }

    #[test]
    fn larger_font_makes_taller_document() {
        let doc = ResumeData::default();
        let small = layout(&doc, &LayoutSettings::new(10, 1.0, 20).unwrap());
        let large = layout(&doc, &LayoutSettings::new(18, 2.0, 20).unwrap());
        assert!(large.height > small.height);
    }

    #[test]
    fn dates_are_right_aligned() {
        let settings = LayoutSettings::default();
        let doc_layout = layout(&ResumeData::default(), &settings);
        let edu = doc_layout.blocks.iter().find(|b| b.id == "edu-2").unwrap();
        let right_edge = PAGE_PIXEL_WIDTH - settings.padding_px();
        let date = edu
            .lines
            .iter()
            .flat_map(|l| &l.segments)
            .find(|s| s.text.contains("Sep 2018"))
            .unwrap();
        assert!((date.x + date.width - right_edge).abs() < 0.5);
    }

    #[test]
    fn list_items_get_markers() {
        let doc_layout = layout(&ResumeData::default(), &LayoutSettings::default());
        let work = doc_layout.blocks.iter().find(|b| b.id == "work-1").unwrap();
        let markers = work
            .lines
            .iter()
            .filter(|l| l.segments.len() == 1 && l.segments[0].text == "\u{2022}")
            .count();
        assert_eq!(markers, 3);
    }

    #[test]
    fn geometry_matches_blocks() {
        let doc_layout = layout(&ResumeData::default(), &LayoutSettings::default());
        let geometry = doc_layout.block_geometry();
        assert_eq!(geometry.len(), doc_layout.blocks.len());
        assert_eq!(geometry[1].top, doc_layout.blocks[1].top);
    }
}
