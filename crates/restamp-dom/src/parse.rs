use restamp_core::{RestampError, RestampResult};

use crate::document::{ElementData, Node, NodeId, NodeKind};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Permissive HTML fragment parser. Tolerates unknown tags, bare
/// attributes, and mismatched close tags; only structurally broken input
/// (end of input inside a tag or attribute value) is an error.
pub(crate) fn parse_fragment(arena: &mut Vec<Node>, html: &str) -> RestampResult<Vec<NodeId>> {
    Parser {
        chars: html.chars().collect(),
        pos: 0,
        arena,
    }
    .run()
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    arena: &'a mut Vec<Node>,
}

impl Parser<'_> {
    fn run(mut self) -> RestampResult<Vec<NodeId>> {
        let mut roots = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();

        while !self.eof() {
            if self.peek() == '<' {
                if self.lookahead("<!--") {
                    self.skip_comment();
                } else if self.lookahead("<!") {
                    self.skip_until('>');
                } else if self.lookahead("</") {
                    self.close_tag(&mut stack);
                } else if self
                    .chars
                    .get(self.pos + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic())
                {
                    self.open_tag(&mut roots, &mut stack)?;
                } else {
                    self.take_text(&mut roots, &mut stack);
                }
            } else {
                self.take_text(&mut roots, &mut stack);
            }
        }
        Ok(roots)
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn lookahead(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn lookahead_ci(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| {
            self.chars
                .get(self.pos + i)
                .is_some_and(|g| g.eq_ignore_ascii_case(&c))
        })
    }

    fn skip_comment(&mut self) {
        self.pos += 4;
        while !self.eof() && !self.lookahead("-->") {
            self.pos += 1;
        }
        self.pos = (self.pos + 3).min(self.chars.len());
    }

    fn skip_until(&mut self, end: char) {
        while !self.eof() && self.peek() != end {
            self.pos += 1;
        }
        if !self.eof() {
            self.pos += 1;
        }
    }

    fn skip_ws(&mut self) {
        while !self.eof() && self.peek().is_whitespace() {
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> String {
        let mut s = String::new();
        while !self.eof() {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' {
                s.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        s.to_ascii_lowercase()
    }

    fn close_tag(&mut self, stack: &mut Vec<NodeId>) {
        self.pos += 2;
        let name = self.read_name();
        self.skip_until('>');
        if let Some(idx) = stack
            .iter()
            .rposition(|id| self.arena[id.index()].element_tag() == Some(name.as_str()))
        {
            stack.truncate(idx);
        }
    }

    fn open_tag(&mut self, roots: &mut Vec<NodeId>, stack: &mut Vec<NodeId>) -> RestampResult<()> {
        self.pos += 1;
        let tag = self.read_name();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_ws();
            if self.eof() {
                return Err(RestampError::Parse(format!(
                    "unexpected end of input inside <{}>",
                    tag
                )));
            }
            match self.peek() {
                '>' => {
                    self.pos += 1;
                    break;
                }
                '/' => {
                    self.pos += 1;
                    self.skip_ws();
                    if !self.eof() && self.peek() == '>' {
                        self.pos += 1;
                        self_closing = true;
                        break;
                    }
                }
                _ => {
                    let name = self.read_name();
                    if name.is_empty() {
                        self.pos += 1;
                        continue;
                    }
                    self.skip_ws();
                    let value = if !self.eof() && self.peek() == '=' {
                        self.pos += 1;
                        self.skip_ws();
                        self.read_attr_value(&tag)?
                    } else {
                        String::new()
                    };
                    attrs.push((name, value));
                }
            }
        }

        let id = self.push_node(NodeKind::Element(ElementData {
            tag: tag.clone(),
            attrs,
        }));
        attach(self.arena, roots, stack, id);

        if self_closing || is_void(&tag) {
            return Ok(());
        }
        if tag == "script" || tag == "style" {
            self.raw_text(&tag, id);
            return Ok(());
        }
        stack.push(id);
        Ok(())
    }

    fn read_attr_value(&mut self, tag: &str) -> RestampResult<String> {
        if self.eof() {
            return Err(RestampError::Parse(format!(
                "unexpected end of input inside <{}>",
                tag
            )));
        }
        let quote = self.peek();
        let mut s = String::new();
        if quote == '"' || quote == '\'' {
            self.pos += 1;
            loop {
                if self.eof() {
                    return Err(RestampError::Parse(format!(
                        "unterminated attribute value in <{}>",
                        tag
                    )));
                }
                let c = self.peek();
                self.pos += 1;
                if c == quote {
                    break;
                }
                s.push(c);
            }
        } else {
            while !self.eof() && !self.peek().is_whitespace() && self.peek() != '>' {
                s.push(self.peek());
                self.pos += 1;
            }
        }
        Ok(decode_entities(&s))
    }

    /// Consume raw text content up to the matching close tag. Used for
    /// script and style, whose content is not markup.
    fn raw_text(&mut self, tag: &str, parent: NodeId) {
        let close = format!("</{}", tag);
        let mut s = String::new();
        while !self.eof() && !self.lookahead_ci(&close) {
            s.push(self.peek());
            self.pos += 1;
        }
        if !self.eof() {
            self.pos += close.chars().count();
            self.skip_until('>');
        }
        if !s.is_empty() {
            let id = self.push_node(NodeKind::Text(s));
            self.arena[id.index()].parent = Some(parent);
            self.arena[parent.index()].children.push(id);
        }
    }

    fn take_text(&mut self, roots: &mut Vec<NodeId>, stack: &mut Vec<NodeId>) {
        let mut s = String::new();
        // A stray `<` that opened no tag is literal text.
        s.push(self.peek());
        self.pos += 1;
        while !self.eof() && self.peek() != '<' {
            s.push(self.peek());
            self.pos += 1;
        }
        // Whitespace-only runs between tags carry no content.
        if s.trim().is_empty() {
            return;
        }
        let id = self.push_node(NodeKind::Text(decode_entities(&s)));
        attach(self.arena, roots, stack, id);
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        self.arena.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        NodeId::new(self.arena.len() - 1)
    }
}

fn attach(arena: &mut [Node], roots: &mut Vec<NodeId>, stack: &[NodeId], id: NodeId) {
    match stack.last() {
        Some(&parent) => {
            arena[id.index()].parent = Some(parent);
            arena[parent.index()].children.push(id);
        }
        None => roots.push(id),
    }
}

pub(crate) fn decode_entities(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '&' {
            if let Some(semi) = chars[i + 1..].iter().take(9).position(|&c| c == ';') {
                let name: String = chars[i + 1..i + 1 + semi].iter().collect();
                if let Some(decoded) = decode_entity(&name) {
                    out.push_str(&decoded);
                    i += semi + 2;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn decode_entity(name: &str) -> Option<String> {
    match name {
        "amp" => Some("&".to_string()),
        "lt" => Some("<".to_string()),
        "gt" => Some(">".to_string()),
        "quot" => Some("\"".to_string()),
        "apos" => Some("'".to_string()),
        "nbsp" => Some("\u{a0}".to_string()),
        "copy" => Some("©".to_string()),
        _ => {
            let num = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
                .map(|h| u32::from_str_radix(h, 16))
                .or_else(|| name.strip_prefix('#').map(|d| d.parse::<u32>()));
            match num {
                Some(Ok(n)) => char::from_u32(n).map(|c| c.to_string()),
                _ => None,
            }
        }
    }
}

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&copy; 2025"), "© 2025");
        assert_eq!(decode_entities("&#169; &#xA9;"), "© ©");
        assert_eq!(decode_entities("&bogus; stays"), "&bogus; stays");
    }

    #[test]
    fn escape_roundtrips_through_decode() {
        let raw = "a < b & \"c\"";
        assert_eq!(decode_entities(&escape_text(raw)), raw);
    }
}
