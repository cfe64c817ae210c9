//! HTML fragment parser – converts the inline markup stored in rich-text
//! fields into a simple DOM tree.
//!
//! Fields only ever hold a controlled subset (what a content-editable box
//! produces): `b/strong`, `i/em`, `a`, `ul/ol/li`, `p/div/br` and `span`.
//! Anything else is parsed as [`Tag::Unknown`] and left for the sanitizer
//! to unwrap. The parser never fails; malformed markup degrades to text.

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    B,
    Strong,
    I,
    Em,
    A,
    Ul,
    Ol,
    Li,
    P,
    Div,
    Span,
    Br,
    /// Elements whose content is never text (`script`, `style`).
    Script,
    Style,
    /// Catch-all for unknown tags.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "i" => Tag::I,
            "em" => Tag::Em,
            "a" => Tag::A,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "p" => Tag::P,
            "div" => Tag::Div,
            "span" => Tag::Span,
            "br" => Tag::Br,
            "script" => Tag::Script,
            "style" => Tag::Style,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Br => true,
            Tag::Unknown(name) => matches!(
                name.as_str(),
                "img" | "hr" | "input" | "meta" | "link" | "wbr" | "col" | "source"
            ),
            _ => false,
        }
    }

    /// Elements that start a new line of text.
    pub fn is_block(&self) -> bool {
        matches!(self, Tag::P | Tag::Div | Tag::Ul | Tag::Ol | Tag::Li)
    }

    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Script | Tag::Style)
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn href(&self) -> Option<&str> {
        self.attributes.get("href").map(|s| s.as_str())
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) if !e.tag.is_raw_text() => collect_text(&e.children, out),
            DomNode::Element(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the fragment
// ---------------------------------------------------------------------------

/// Parse an HTML fragment into a list of DOM nodes.
pub fn parse_fragment(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes(0)
}

/// Elements nested deeper than this are parsed flat, as siblings.
pub const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self, depth: usize) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                if depth > 0 {
                    break;
                }
                // Stray closing tag at the top level.
                self.skip_past('>');
                continue;
            }
            if let Some(node) = self.parse_node(depth) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self, depth: usize) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past('>');
            return None;
        }
        let next_is_name = self.input[self.pos..]
            .chars()
            .nth(1)
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false);
        if self.starts_with("<") && next_is_name {
            Some(self.parse_element(depth))
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // A lone '<' that does not open a tag is literal text.
        if self.starts_with("<") {
            self.advance();
        }
        while !self.eof() && !self.starts_with("<") {
            self.advance();
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self, depth: usize) -> DomNode {
        self.advance(); // '<'
        let tag = Tag::from_name(&self.parse_name());
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute();
            if key.is_empty() {
                // Garbage inside the tag; skip one char to make progress.
                self.advance();
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.pos += 1;
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }
        if depth >= MAX_DEPTH {
            return DomNode::Element(elem);
        }

        if elem.tag.is_raw_text() {
            let close = format!("</{}", tag_name(&elem.tag));
            let rest = &self.input[self.pos..];
            let end = rest
                .to_ascii_lowercase()
                .find(&close)
                .unwrap_or(rest.len());
            elem.children = vec![DomNode::Text(rest[..end].to_string())];
            self.pos += end;
        } else {
            elem.children = self.parse_nodes(depth + 1);
        }

        // Consume the closing tag, whichever it is.
        if self.starts_with("</") {
            self.skip_past('>');
        }
        DomNode::Element(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(); // '='
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.current_char_opt() == Some(quote) {
                self.advance();
                let start = self.pos;
                while !self.eof() && self.current_char() != quote {
                    self.advance();
                }
                let val = decode_entities(&self.input[start..self.pos]);
                if !self.eof() {
                    self.advance();
                }
                return val;
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' || c == '/' {
                break;
            }
            self.advance();
        }
        decode_entities(&self.input[start..self.pos])
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn skip_past(&mut self, ch: char) {
        while !self.eof() && self.current_char() != ch {
            self.advance();
        }
        if !self.eof() {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        self.pos += 4; // <!--
        match self.input[self.pos..].find("-->") {
            Some(i) => self.pos += i + 3,
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.current_char_opt().unwrap_or('\0')
    }

    fn current_char_opt(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char_opt() {
            self.pos += c.len_utf8();
        }
    }
}

fn tag_name(tag: &Tag) -> &str {
    match tag {
        Tag::Script => "script",
        Tag::Style => "style",
        Tag::Unknown(name) => name,
        _ => "",
    }
}

/// Decode the named entities a content-editable box emits plus numeric
/// character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Escape text content for HTML output.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for use inside double quotes.
pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
