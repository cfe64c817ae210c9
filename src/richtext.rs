//! Bounded-command rich text.
//!
//! Rich-text fields (work/project details, "others", summary, custom
//! sections) are stored as inline HTML. Editing goes through [`RichText`]:
//! parse and sanitize the stored markup, apply one of a fixed set of
//! [`Command`]s to a character range, and serialize back. Whatever comes in,
//! what goes out only ever contains `p`, `ul/ol/li`, `b`, `i` and
//! `a href` with a safe scheme.

use std::ops::Range;

use crate::dom::{escape_attr, escape_text, parse_fragment, DomNode, Tag};
use crate::error::{Error, Result};

/// How a block of rich text is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockStyle {
    Paragraph,
    Bullet,
    Ordered,
}

impl BlockStyle {
    pub fn is_list(self) -> bool {
        !matches!(self, BlockStyle::Paragraph)
    }
}

/// Inline formatting carried by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub link: Option<String>,
}

/// A maximal piece of text with uniform marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub marks: Marks,
}

/// A paragraph or list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichBlock {
    pub style: BlockStyle,
    pub runs: Vec<Run>,
}

impl RichBlock {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn char_len(&self) -> usize {
        self.runs.iter().map(|r| r.text.chars().count()).sum()
    }
}

/// The editing commands a rich-text field supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bold,
    Italic,
    Link(String),
    Unlink,
    BulletList,
    OrderedList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    pub blocks: Vec<RichBlock>,
}

impl RichText {
    /// Parse stored markup, discarding everything outside the allowed subset.
    pub fn from_html(html: &str) -> Self {
        let mut builder = Builder::default();
        builder.walk(&parse_fragment(html), &Marks::default(), BlockStyle::Paragraph);
        builder.finish_block();
        RichText {
            blocks: builder.blocks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Text of every block, joined by `\n`. Command ranges index into this.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(RichBlock::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize to sanitized inline HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let mut open_list: Option<BlockStyle> = None;

        for block in &self.blocks {
            if open_list.is_some() && open_list != Some(block.style) {
                out.push_str(close_list_tag(open_list));
                open_list = None;
            }
            match block.style {
                BlockStyle::Paragraph => {
                    out.push_str("<p>");
                    write_runs(&mut out, &block.runs);
                    out.push_str("</p>");
                }
                style => {
                    if open_list.is_none() {
                        out.push_str(if style == BlockStyle::Ordered {
                            "<ol>"
                        } else {
                            "<ul>"
                        });
                        open_list = Some(style);
                    }
                    out.push_str("<li>");
                    write_runs(&mut out, &block.runs);
                    out.push_str("</li>");
                }
            }
        }
        out.push_str(close_list_tag(open_list));
        out
    }

    /// Apply `command` to the characters in `range` of [`plain_text`].
    ///
    /// Mark commands toggle: if every character in the range already has the
    /// mark it is removed, otherwise it is set. List commands toggle every
    /// block the range touches between the list style and paragraphs. A
    /// collapsed range is a no-op for mark commands and selects the block
    /// under the caret for list commands.
    ///
    /// [`plain_text`]: RichText::plain_text
    pub fn apply(&mut self, range: Range<usize>, command: Command) -> Result<()> {
        match command {
            Command::Bold => self.toggle_mark(range, |m| m.bold, |m, on| m.bold = on),
            Command::Italic => self.toggle_mark(range, |m| m.italic, |m, on| m.italic = on),
            Command::Link(url) => {
                let url = url.trim().to_string();
                if !is_safe_href(&url) {
                    return Err(Error::UnsafeLink(url));
                }
                self.edit_marks(range, |m| m.link = Some(url.clone()));
            }
            Command::Unlink => self.edit_marks(range, |m| m.link = None),
            Command::BulletList => self.toggle_list(range, BlockStyle::Bullet),
            Command::OrderedList => self.toggle_list(range, BlockStyle::Ordered),
        }
        Ok(())
    }

    /// For each block overlapping `range`, the overlapping char range within it.
    fn overlaps(&self, range: &Range<usize>) -> Vec<(usize, Range<usize>)> {
        let mut result = Vec::new();
        let mut start = 0usize;
        for (i, block) in self.blocks.iter().enumerate() {
            let len = block.char_len();
            let lo = range.start.max(start);
            let hi = range.end.min(start + len);
            if lo < hi {
                result.push((i, lo - start..hi - start));
            }
            start += len + 1;
        }
        result
    }

    fn toggle_mark(
        &mut self,
        range: Range<usize>,
        get: impl Fn(&Marks) -> bool,
        set: impl Fn(&mut Marks, bool),
    ) {
        let overlaps = self.overlaps(&range);
        if overlaps.is_empty() {
            return;
        }
        let all_set = overlaps.iter().all(|(b, r)| {
            explode(&self.blocks[*b].runs)[r.clone()]
                .iter()
                .all(|(_, m)| get(m))
        });
        self.edit_marks(range, |m| set(m, !all_set));
    }

    fn edit_marks(&mut self, range: Range<usize>, edit: impl Fn(&mut Marks)) {
        for (b, r) in self.overlaps(&range) {
            let block = &mut self.blocks[b];
            let mut chars = explode(&block.runs);
            for (_, marks) in &mut chars[r] {
                edit(marks);
            }
            block.runs = implode(chars);
        }
    }

    fn toggle_list(&mut self, range: Range<usize>, style: BlockStyle) {
        let mut touched = Vec::new();
        let mut start = 0usize;
        for (i, block) in self.blocks.iter().enumerate() {
            let end = start + block.char_len();
            if range.start <= end && range.end >= start {
                touched.push(i);
            }
            start = end + 1;
        }
        if touched.is_empty() {
            return;
        }
        let all_styled = touched.iter().all(|&i| self.blocks[i].style == style);
        let target = if all_styled {
            BlockStyle::Paragraph
        } else {
            style
        };
        for i in touched {
            self.blocks[i].style = target;
        }
    }
}

/// Sanitize stored markup in one step.
pub fn sanitize_html(html: &str) -> String {
    RichText::from_html(html).to_html()
}

/// Link targets we are willing to emit.
pub fn is_safe_href(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.chars().any(char::is_control) {
        return false;
    }
    let lower = url.to_ascii_lowercase();
    ["http://", "https://", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn close_list_tag(style: Option<BlockStyle>) -> &'static str {
    match style {
        Some(BlockStyle::Ordered) => "</ol>",
        Some(BlockStyle::Bullet) => "</ul>",
        _ => "",
    }
}

fn write_runs(out: &mut String, runs: &[Run]) {
    for run in runs {
        let mut close = Vec::new();
        if let Some(href) = &run.marks.link {
            out.push_str(&format!("<a href=\"{}\">", escape_attr(href)));
            close.push("</a>");
        }
        if run.marks.bold {
            out.push_str("<b>");
            close.push("</b>");
        }
        if run.marks.italic {
            out.push_str("<i>");
            close.push("</i>");
        }
        out.push_str(&escape_text(&run.text));
        for tag in close.iter().rev() {
            out.push_str(tag);
        }
    }
}

fn explode(runs: &[Run]) -> Vec<(char, Marks)> {
    runs.iter()
        .flat_map(|r| r.text.chars().map(move |c| (c, r.marks.clone())))
        .collect()
}

fn implode(chars: Vec<(char, Marks)>) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (c, marks) in chars {
        match runs.last_mut() {
            Some(run) if run.marks == marks => run.text.push(c),
            _ => runs.push(Run {
                text: c.to_string(),
                marks,
            }),
        }
    }
    runs
}

/// Accumulates blocks while walking a parsed fragment.
#[derive(Default)]
struct Builder {
    blocks: Vec<RichBlock>,
    open: Option<RichBlock>,
}

impl Builder {
    fn walk(&mut self, nodes: &[DomNode], marks: &Marks, style: BlockStyle) {
        for node in nodes {
            match node {
                DomNode::Text(text) => self.push_text(text, marks, style),
                DomNode::Element(e) => match &e.tag {
                    Tag::Script | Tag::Style => {}
                    Tag::B | Tag::Strong => {
                        let m = Marks {
                            bold: true,
                            ..marks.clone()
                        };
                        self.walk(&e.children, &m, style);
                    }
                    Tag::I | Tag::Em => {
                        let m = Marks {
                            italic: true,
                            ..marks.clone()
                        };
                        self.walk(&e.children, &m, style);
                    }
                    Tag::A => {
                        let link = e
                            .href()
                            .map(str::trim)
                            .filter(|h| is_safe_href(h))
                            .map(str::to_string);
                        let m = Marks {
                            link: link.or_else(|| marks.link.clone()),
                            ..marks.clone()
                        };
                        self.walk(&e.children, &m, style);
                    }
                    Tag::Br => {
                        self.finish_block();
                    }
                    Tag::P | Tag::Div => {
                        self.finish_block();
                        self.walk(&e.children, marks, style);
                        self.finish_block();
                    }
                    Tag::Ul | Tag::Ol => {
                        self.finish_block();
                        let list = if e.tag == Tag::Ol {
                            BlockStyle::Ordered
                        } else {
                            BlockStyle::Bullet
                        };
                        self.walk(&e.children, marks, list);
                        self.finish_block();
                    }
                    Tag::Li => {
                        self.finish_block();
                        let item = if style.is_list() {
                            style
                        } else {
                            BlockStyle::Bullet
                        };
                        self.open = Some(RichBlock {
                            style: item,
                            runs: Vec::new(),
                        });
                        self.walk(&e.children, marks, item);
                        self.finish_block();
                    }
                    Tag::Span | Tag::Unknown(_) => self.walk(&e.children, marks, style),
                },
            }
        }
    }

    fn push_text(&mut self, text: &str, marks: &Marks, style: BlockStyle) {
        let block = self.open.get_or_insert_with(|| RichBlock {
            style,
            runs: Vec::new(),
        });
        let mut at_space = block
            .runs
            .last()
            .map(|r| r.text.ends_with(' '))
            .unwrap_or(true);

        let mut collapsed = String::with_capacity(text.len());
        for c in text.chars() {
            if c.is_ascii_whitespace() {
                if !at_space {
                    collapsed.push(' ');
                    at_space = true;
                }
            } else {
                collapsed.push(c);
                at_space = false;
            }
        }
        if collapsed.is_empty() {
            return;
        }
        match block.runs.last_mut() {
            Some(run) if run.marks == *marks => run.text.push_str(&collapsed),
            _ => block.runs.push(Run {
                text: collapsed,
                marks: marks.clone(),
            }),
        }
    }

    fn finish_block(&mut self) {
        let Some(mut block) = self.open.take() else {
            return;
        };
        if let Some(last) = block.runs.last_mut() {
            let trimmed = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed);
        }
        block.runs.retain(|r| !r.text.is_empty());
        if !block.runs.is_empty() {
            self.blocks.push(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bulleted_details() {
        let rt = RichText::from_html(
            "<ul>\n<li><b>Lead:</b> shipped the thing</li>\n<li>Second</li>\n</ul>",
        );
        assert_eq!(rt.blocks.len(), 2);
        assert_eq!(rt.blocks[0].style, BlockStyle::Bullet);
        assert_eq!(rt.blocks[0].runs.len(), 2);
        assert!(rt.blocks[0].runs[0].marks.bold);
        assert_eq!(rt.blocks[0].runs[1].text, " shipped the thing");
        assert_eq!(rt.plain_text(), "Lead: shipped the thing\nSecond");
    }

    #[test]
    fn sanitizer_strips_scripts_and_attributes() {
        let out = sanitize_html(
            r#"<div onclick="evil()">Hi <script>alert(1)</script><span style="color:red">there</span></div>"#,
        );
        assert_eq!(out, "<p>Hi there</p>");
    }

    #[test]
    fn sanitizer_drops_unsafe_links_but_keeps_text() {
        let out = sanitize_html(r#"<a href="javascript:alert(1)">click</a> <a href="https://x.dev">ok</a>"#);
        assert_eq!(out, "<p>click <a href=\"https://x.dev\">ok</a></p>");
    }

    #[test]
    fn sanitize_is_stable() {
        let once = sanitize_html("<ol><li><i>a &amp; b</i></li></ol><p>tail</p>");
        assert_eq!(once, "<ol><li><i>a &amp; b</i></li></ol><p>tail</p>");
        assert_eq!(sanitize_html(&once), once);
    }

    #[test]
    fn bold_toggles_over_range() {
        let mut rt = RichText::from_html("<p>hello world</p>");
        rt.apply(0..5, Command::Bold).unwrap();
        assert_eq!(rt.to_html(), "<p><b>hello</b> world</p>");
        rt.apply(0..5, Command::Bold).unwrap();
        assert_eq!(rt.to_html(), "<p>hello world</p>");
    }

    #[test]
    fn partial_bold_range_sets_rather_than_clears() {
        let mut rt = RichText::from_html("<p><b>he</b>llo</p>");
        rt.apply(0..5, Command::Bold).unwrap();
        assert_eq!(rt.to_html(), "<p><b>hello</b></p>");
    }

    #[test]
    fn marks_span_blocks() {
        let mut rt = RichText::from_html("<p>ab</p><p>cd</p>");
        // "ab\ncd": select "b\nc"
        rt.apply(1..4, Command::Italic).unwrap();
        assert_eq!(rt.to_html(), "<p>a<i>b</i></p><p><i>c</i>d</p>");
    }

    #[test]
    fn link_requires_safe_scheme() {
        let mut rt = RichText::from_html("<p>site</p>");
        assert!(matches!(
            rt.apply(0..4, Command::Link("javascript:x".into())),
            Err(Error::UnsafeLink(_))
        ));
        rt.apply(0..4, Command::Link(" https://a.b ".into())).unwrap();
        assert_eq!(rt.to_html(), "<p><a href=\"https://a.b\">site</a></p>");
        rt.apply(0..4, Command::Unlink).unwrap();
        assert_eq!(rt.to_html(), "<p>site</p>");
    }

    #[test]
    fn list_commands_toggle() {
        let mut rt = RichText::from_html("<p>one</p><p>two</p>");
        rt.apply(0..5, Command::BulletList).unwrap();
        assert_eq!(rt.to_html(), "<ul><li>one</li><li>two</li></ul>");
        rt.apply(0..0, Command::OrderedList).unwrap();
        assert_eq!(rt.to_html(), "<ol><li>one</li></ol><ul><li>two</li></ul>");
        rt.apply(0..7, Command::BulletList).unwrap();
        assert_eq!(rt.to_html(), "<ul><li>one</li><li>two</li></ul>");
        rt.apply(0..7, Command::BulletList).unwrap();
        assert_eq!(rt.to_html(), "<p>one</p><p>two</p>");
    }

    #[test]
    fn collapsed_range_mark_is_noop() {
        let mut rt = RichText::from_html("<p>x</p>");
        rt.apply(1..1, Command::Bold).unwrap();
        assert_eq!(rt.to_html(), "<p>x</p>");
    }

    #[test]
    fn empty_markup_is_empty() {
        assert!(RichText::from_html("  <p> </p><br>").is_empty());
        assert_eq!(sanitize_html(""), "");
    }

    #[test]
    fn deeply_nested_markup_is_sanitized() {
        let html = format!("{}Rust", "<b>".repeat(200_000));
        let out = sanitize_html(&html);
        assert_eq!(out, "<p><b>Rust</b></p>");
    }
}
