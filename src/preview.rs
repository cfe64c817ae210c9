//! Document renderer – turns a [`ResumeData`] into an ordered list of
//! non-splittable [`Block`]s, and those blocks into screen or print HTML.
//!
//! Blocks are the unit the pagination engine works with: the header, one
//! block per education/work/project entry, one per rich-text section. A
//! section heading travels with the first block of its section so that it
//! never ends a page on its own.

use std::collections::HashSet;
use std::fmt::Write as _;

use log::debug;

use crate::dom::{escape_attr, escape_text};
use crate::model::ResumeData;
use crate::model::SectionKey;
use crate::richtext::RichText;
use crate::sections::SectionRegistry;
use crate::settings::{LayoutSettings, PAGE_PIXEL_WIDTH};

// ---------------------------------------------------------------------------
// Rendered tree
// ---------------------------------------------------------------------------

/// Text colour roles. The palette is black and greys on white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    /// Near-black, used for names and dates.
    Ink,
    /// Default body text.
    #[default]
    Body,
    /// Secondary text such as locations and contact info.
    Muted,
    /// White text on the heading label.
    Inverse,
    /// Light grey behind the heading label.
    Shade,
}

impl Tone {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Tone::Ink => [0x11, 0x18, 0x27],
            Tone::Body => [0x37, 0x41, 0x51],
            Tone::Muted => [0x6b, 0x72, 0x80],
            Tone::Inverse => [0xff, 0xff, 0xff],
            Tone::Shade => [0xd1, 0xd5, 0xdb],
        }
    }

    fn css(self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// A piece of styled text. `scale` is relative to the base font size.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub scale: f32,
    pub bold: bool,
    pub italic: bool,
    pub tone: Tone,
    pub link: Option<String>,
}

impl TextSpan {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scale: 1.0,
            bold: false,
            italic: false,
            tone: Tone::Body,
            link: None,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }
}

/// One visual element inside a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Section heading: black label with a rule underneath.
    Heading(String),
    /// A single wrapped paragraph.
    Paragraph { spans: Vec<TextSpan> },
    /// Flexible left column next to a right-aligned fixed column. Each
    /// inner `Vec<TextSpan>` is one line.
    Columns {
        left: Vec<Vec<TextSpan>>,
        right: Vec<Vec<TextSpan>>,
    },
    Rich(RichText),
}

/// A non-splittable unit of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    /// `None` for the header block.
    pub section: Option<SectionKey>,
    pub elements: Vec<Element>,
    /// Space below the block in px.
    pub spacing_px: f32,
}

impl Block {
    pub fn has_heading(&self) -> bool {
        matches!(self.elements.first(), Some(Element::Heading(_)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedDocument {
    pub blocks: Vec<Block>,
}

pub const HEADER_BLOCK_ID: &str = "header";

/// Render the document into blocks, in presentation order.
pub fn render_document(doc: &ResumeData, registry: &SectionRegistry) -> RenderedDocument {
    let mut blocks = vec![header_block(doc)];
    let mut seen = HashSet::new();

    for key in &doc.section_order {
        if !seen.insert(key) {
            continue;
        }
        let behavior = registry.behavior(key);
        let Some(view) = behavior.view(doc, key) else {
            debug!("Skipping unknown section {key}");
            continue;
        };
        if !view.visible {
            continue;
        }

        let heading = Element::Heading(view.title.to_string());
        let entries = behavior.render(doc, key);
        if entries.is_empty() {
            blocks.push(Block {
                id: format!("{key}-heading"),
                section: Some(key.clone()),
                elements: vec![heading],
                spacing_px: 8.0,
            });
            continue;
        }

        for (i, entry) in entries.into_iter().enumerate() {
            let mut elements = entry.elements;
            if i == 0 {
                elements.insert(0, heading.clone());
            }
            blocks.push(Block {
                id: entry.id,
                section: Some(key.clone()),
                elements,
                spacing_px: entry.spacing_px,
            });
        }
    }

    debug!("Rendered {} blocks", blocks.len());
    RenderedDocument { blocks }
}

fn header_block(doc: &ResumeData) -> Block {
    let basics = &doc.basics;
    let mut elements = vec![
        Element::Paragraph {
            spans: vec![TextSpan::new(&basics.name)
                .bold()
                .scale(2.5)
                .tone(Tone::Ink)],
        },
        Element::Paragraph {
            spans: vec![TextSpan::new(&basics.contact_info).tone(Tone::Muted)],
        },
    ];
    if let Some(note) = basics.note.as_deref().filter(|n| !n.trim().is_empty()) {
        elements.push(Element::Paragraph {
            spans: vec![TextSpan::new(note).italic().scale(0.9).tone(Tone::Muted)],
        });
    }
    Block {
        id: HEADER_BLOCK_ID.to_string(),
        section: None,
        elements,
        spacing_px: 32.0,
    }
}

// ---------------------------------------------------------------------------
// HTML output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlTarget {
    /// Continuous preview container.
    Screen,
    /// Print document: margins repeat on every physical page through
    /// table header/footer spacer rows.
    Print,
}

/// Serialize rendered blocks to a standalone HTML document.
pub fn render_html(
    rendered: &RenderedDocument,
    settings: &LayoutSettings,
    title: &str,
    target: HtmlTarget,
) -> String {
    let mut body = String::new();
    for block in &rendered.blocks {
        write_block(&mut body, block);
    }

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    let _ = write!(out, "<title>{}</title>", escape_text(title));
    out.push_str("<style>");
    out.push_str(&base_css(settings));
    if target == HtmlTarget::Print {
        out.push_str(&print_css(settings));
    }
    out.push_str("</style></head><body>");

    match target {
        HtmlTarget::Screen => {
            let _ = write!(out, "<div class=\"resume\">{body}</div>");
        }
        HtmlTarget::Print => {
            let _ = write!(
                out,
                "<table class=\"print\">\
<thead><tr><td><div class=\"spacer\"></div></td></tr></thead>\
<tbody><tr><td><div class=\"resume\">{body}</div></td></tr></tbody>\
<tfoot><tr><td><div class=\"spacer\"></div></td></tr></tfoot>\
</table>"
            );
        }
    }
    out.push_str("</body></html>\n");
    out
}

fn base_css(settings: &LayoutSettings) -> String {
    format!(
        "body{{margin:0;background:#fff;color:{body}}}\
.resume{{box-sizing:border-box;width:{width}px;padding:{pad}mm;font-size:{fs}px;line-height:{lh}}}\
.block{{break-inside:avoid;page-break-inside:avoid}}\
.heading{{display:flex;flex-direction:column;margin:16px 0 8px}}\
.heading span{{align-self:flex-start;background:#000;color:#fff;font-weight:bold;padding:4px 64px 4px 24px;box-shadow:6px 0 0 {shade}}}\
.heading hr{{width:100%;height:2px;background:#000;border:0;margin:0}}\
.cols{{display:flex;gap:16px}}.cols .left{{flex:1}}.cols .right{{min-width:180px;text-align:right}}\
.rich ul,.rich ol{{margin:0;padding-left:16px}}.rich p{{margin:0}}\
a{{color:inherit}}",
        body = Tone::Body.css(),
        shade = Tone::Shade.css(),
        width = PAGE_PIXEL_WIDTH,
        pad = settings.page_padding,
        fs = settings.font_size,
        lh = settings.line_height,
    )
}

fn print_css(settings: &LayoutSettings) -> String {
    format!(
        "@page{{size:A4;margin:0}}\
table.print{{border-collapse:collapse;width:100%}}\
table.print td{{padding:0}}\
table.print thead{{display:table-header-group}}\
table.print tfoot{{display:table-footer-group}}\
.spacer{{height:{pad}mm}}\
.resume{{padding-top:0;padding-bottom:0}}",
        pad = settings.page_padding,
    )
}

fn write_block(out: &mut String, block: &Block) {
    let _ = write!(
        out,
        "<div class=\"block\" data-block=\"{}\" style=\"margin-bottom:{}px\">",
        escape_attr(&block.id),
        block.spacing_px
    );
    for element in &block.elements {
        write_element(out, element);
    }
    out.push_str("</div>");
}

fn write_element(out: &mut String, element: &Element) {
    match element {
        Element::Heading(title) => {
            let _ = write!(
                out,
                "<div class=\"heading\"><span>{}</span><hr></div>",
                escape_text(title)
            );
        }
        Element::Paragraph { spans } => {
            out.push_str("<div>");
            write_spans(out, spans);
            out.push_str("</div>");
        }
        Element::Columns { left, right } => {
            out.push_str("<div class=\"cols\"><div class=\"left\">");
            for line in left {
                out.push_str("<div>");
                write_spans(out, line);
                out.push_str("</div>");
            }
            out.push_str("</div><div class=\"right\">");
            for line in right {
                out.push_str("<div>");
                write_spans(out, line);
                out.push_str("</div>");
            }
            out.push_str("</div></div>");
        }
        Element::Rich(rich) => {
            let _ = write!(out, "<div class=\"rich\">{}</div>", rich.to_html());
        }
    }
}

fn write_spans(out: &mut String, spans: &[TextSpan]) {
    for span in spans {
        let mut style = format!("color:{}", span.tone.css());
        if span.scale != 1.0 {
            let _ = write!(style, ";font-size:{}em", span.scale);
        }
        if span.bold {
            style.push_str(";font-weight:bold");
        }
        if span.italic {
            style.push_str(";font-style:italic");
        }
        let text = escape_text(&span.text);
        match &span.link {
            Some(href) => {
                let _ = write!(
                    out,
                    "<a href=\"{}\" style=\"{style}\">{text}</a>",
                    escape_attr(href)
                );
            }
            None => {
                let _ = write!(out, "<span style=\"{style}\">{text}</span>");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuiltinSection, CustomSection};

    fn render(doc: &ResumeData) -> RenderedDocument {
        render_document(doc, &SectionRegistry::default())
    }

    #[test]
    fn header_comes_first() {
        let rendered = render(&ResumeData::default());
        assert_eq!(rendered.blocks[0].id, HEADER_BLOCK_ID);
        assert!(rendered.blocks[0].section.is_none());
    }

    #[test]
    fn one_block_per_entry_with_heading_on_first() {
        let doc = ResumeData::default();
        let rendered = render(&doc);
        let edu: Vec<_> = rendered
            .blocks
            .iter()
            .filter(|b| b.section == Some(SectionKey::Builtin(BuiltinSection::Education)))
            .collect();
        assert_eq!(edu.len(), 2);
        assert!(edu[0].has_heading());
        assert!(!edu[1].has_heading());
    }

    #[test]
    fn hidden_sections_are_skipped() {
        let mut doc = ResumeData::default();
        doc.sections.work.visible = false;
        let rendered = render(&doc);
        assert!(rendered.blocks.iter().all(|b| b.id != "work-1"));
    }

    #[test]
    fn duplicate_and_unknown_keys_are_skipped() {
        let mut doc = ResumeData::default();
        doc.section_order = vec![
            SectionKey::Builtin(BuiltinSection::Summary),
            SectionKey::Builtin(BuiltinSection::Summary),
            SectionKey::Custom("ghost".into()),
        ];
        let rendered = render(&doc);
        assert_eq!(rendered.blocks.len(), 2);
        assert_eq!(rendered.blocks[1].id, "summary");
    }

    #[test]
    fn empty_section_renders_heading_only() {
        let mut doc = ResumeData::default();
        doc.education.clear();
        let rendered = render(&doc);
        let block = rendered
            .blocks
            .iter()
            .find(|b| b.id == "education-heading")
            .unwrap();
        assert_eq!(block.elements.len(), 1);
        assert!(block.has_heading());
    }

    #[test]
    fn custom_sections_follow_section_order() {
        let mut doc = ResumeData::default();
        doc.custom_sections.push(CustomSection {
            id: "custom-1".into(),
            title: "Volunteering".into(),
            content: "<p>Food bank</p>".into(),
            visible: true,
        });
        doc.section_order.insert(0, SectionKey::Custom("custom-1".into()));
        let rendered = render(&doc);
        assert_eq!(rendered.blocks[1].id, "custom-1");
        assert_eq!(
            rendered.blocks[1].elements[0],
            Element::Heading("Volunteering".into())
        );
    }

    #[test]
    fn print_html_repeats_margins() {
        let rendered = render(&ResumeData::default());
        let html = render_html(
            &rendered,
            &LayoutSettings::default(),
            "Alex Chen_Resume",
            HtmlTarget::Print,
        );
        assert!(html.contains("display:table-header-group"));
        assert!(html.contains("display:table-footer-group"));
        assert!(html.contains("@page{size:A4;margin:0}"));
        assert!(html.contains(".spacer{height:20mm}"));
        assert!(html.contains("break-inside:avoid"));
    }

    #[test]
    fn screen_html_escapes_text() {
        let mut doc = ResumeData::default();
        doc.basics.name = "<Bob & Co>".into();
        let rendered = render(&doc);
        let html = render_html(&rendered, &LayoutSettings::default(), "x", HtmlTarget::Screen);
        assert!(html.contains("&lt;Bob &amp; Co&gt;"));
        assert!(!html.contains("<thead>"));
    }
}
