//! Minimal XML document model for the tree codec.
//!
//! The interchange schema only needs elements, attributes, and text, so
//! this stays a small recursive-descent parser plus an indenting writer.
//! The five metacharacters are escaped in every text-bearing position;
//! decoding also accepts numeric character references.
//!
//! [`Element::children_named`] always yields a sequence. That accessor is
//! the single normalization point for documents that serialize one child
//! as a lone object and several as a list; codec code never branches on
//! shape anywhere else.

use crate::error::{Error, Result};

/// A parsed XML element: name, attributes, child elements, and the
/// concatenated character data directly inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<Element> {
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
        };
        parser.skip_misc();
        let root = parser.parse_element()?;
        Ok(root)
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name, in document order. A document
    /// carrying a single such child and one carrying many look identical
    /// to callers.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child with the given name, if non-empty.
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Escape the five XML metacharacters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode entity and numeric character references. Unrecognized references
/// are kept literally rather than rejected.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';') {
            Some(semi) if semi <= 10 => {
                let entity = &tail[1..semi];
                match decode_entity(entity) {
                    Some(c) => out.push(c),
                    None => out.push_str(&tail[..=semi]),
                }
                rest = &tail[semi + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or(entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::Xml {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Skip byte-order mark, prolog, comments, and doctype before the root.
    fn skip_misc(&mut self) {
        if self.peek() == Some('\u{FEFF}') {
            self.pos += 1;
        }
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.skip_until("?>");
            } else if self.starts_with("<!--") {
                self.skip_until("-->");
            } else if self.starts_with("<!") {
                self.skip_until(">");
            } else {
                return;
            }
        }
    }

    fn skip_until(&mut self, marker: &str) {
        while self.pos < self.chars.len() && !self.starts_with(marker) {
            self.pos += 1;
        }
        self.advance(marker.chars().count().min(self.chars.len() - self.pos));
    }

    fn read_name(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || "_-.:".contains(c)) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected a name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_element(&mut self) -> Result<Element> {
        if self.peek() != Some('<') {
            return Err(self.err("expected '<'"));
        }
        self.advance(1);
        let name = self.read_name()?;
        let attrs = self.parse_attrs()?;

        self.skip_whitespace();
        if self.starts_with("/>") {
            self.advance(2);
            return Ok(Element {
                name,
                attrs,
                ..Element::default()
            });
        }
        if self.peek() != Some('>') {
            return Err(self.err(format!("unterminated <{}> tag", name)));
        }
        self.advance(1);

        let mut element = Element {
            name,
            attrs,
            ..Element::default()
        };
        loop {
            if self.pos >= self.chars.len() {
                return Err(self.err(format!("unexpected end of input inside <{}>", element.name)));
            }
            if self.starts_with("</") {
                self.advance(2);
                let close = self.read_name()?;
                if close != element.name {
                    return Err(self.err(format!(
                        "mismatched close tag </{}> for <{}>",
                        close, element.name
                    )));
                }
                self.skip_whitespace();
                if self.peek() != Some('>') {
                    return Err(self.err(format!("unterminated </{}> tag", close)));
                }
                self.advance(1);
                return Ok(element);
            } else if self.starts_with("<!--") {
                self.skip_until("-->");
            } else if self.starts_with("<![CDATA[") {
                self.advance("<![CDATA[".len());
                let start = self.pos;
                while self.pos < self.chars.len() && !self.starts_with("]]>") {
                    self.pos += 1;
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                element.text.push_str(&raw);
                self.advance("]]>".len().min(self.chars.len() - self.pos));
            } else if self.peek() == Some('<') {
                element.children.push(self.parse_element()?);
            } else {
                let start = self.pos;
                while self.pos < self.chars.len() && self.peek() != Some('<') {
                    self.pos += 1;
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                element.text.push_str(&unescape(&raw));
            }
        }
    }

    fn parse_attrs(&mut self) -> Result<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('>') | Some('/') | None => return Ok(attrs),
                _ => {}
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            if self.peek() != Some('=') {
                return Err(self.err(format!("attribute {} missing '='", name)));
            }
            self.advance(1);
            self.skip_whitespace();
            let quote = match self.peek() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.err(format!("attribute {} missing quote", name))),
            };
            self.advance(1);
            let start = self.pos;
            while self.pos < self.chars.len() && self.peek() != Some(quote) {
                self.pos += 1;
            }
            if self.pos >= self.chars.len() {
                return Err(self.err(format!("unterminated value for attribute {}", name)));
            }
            let raw: String = self.chars[start..self.pos].iter().collect();
            self.advance(1);
            attrs.push((name, unescape(&raw)));
        }
    }
}

/// Incremental writer producing an indented document.
#[derive(Debug)]
pub struct XmlWriter {
    buf: String,
    stack: Vec<String>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            buf: "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_string(),
            stack: Vec::new(),
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.stack.len() {
            self.buf.push_str("  ");
        }
    }

    /// Open a container element.
    pub fn open(&mut self, name: &str) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push_str(">\n");
        self.stack.push(name.to_string());
    }

    /// Write a leaf element with escaped text content.
    pub fn leaf(&mut self, name: &str, value: &str) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        self.buf.push('>');
        self.buf.push_str(&escape(value));
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push_str(">\n");
    }

    /// Close the most recently opened container.
    pub fn close(&mut self) {
        if let Some(name) = self.stack.pop() {
            self.indent();
            self.buf.push_str("</");
            self.buf.push_str(&name);
            self.buf.push_str(">\n");
        }
    }

    /// Close any open containers and return the document.
    pub fn finish(mut self) -> String {
        while !self.stack.is_empty() {
            self.close();
        }
        self.buf
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}
