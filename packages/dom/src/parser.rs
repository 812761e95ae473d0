//! Tree builder: turns the token stream into a [`Document`]
//!
//! This is a lenient builder, not a full HTML5 tree construction algorithm.
//! It covers what page markup produced by content pipelines needs: void and
//! self-closing elements, raw-text elements, implied `li`/`p` end tags and
//! recovery from stray or missing end tags.

use crate::node::{Attribute, Document, Element, NodeId};
use crate::tokenizer::{decode_entities, parse_end_tag, parse_start_tag, StartTag, Token};
use logos::Logos;

/// Elements that never have content or an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is emitted and read verbatim
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements whose content is read verbatim but may carry character references
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

/// Start tags that implicitly end an open `p`
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "menu",
    "nav", "ol", "p", "pre", "section", "table", "ul",
];

const PHRASING_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "i", "kbd", "mark", "q",
    "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

/// Parse a document or fragment. Never fails.
pub fn parse(source: &str) -> Document {
    let mut builder = TreeBuilder::new();
    let mut lexer = Token::lexer(source);

    while let Some(token) = lexer.next() {
        match token {
            Ok(Token::Text(text)) => builder.text(&decode_entities(text)),
            Ok(Token::CommentOpen) => {
                let rest = lexer.remainder();
                let (body, consumed) = match rest.find("-->") {
                    Some(end) => (&rest[..end], end + 3),
                    None => (rest, rest.len()),
                };
                builder.comment(body);
                lexer.bump(consumed);
            }
            Ok(Token::Doctype(raw)) => builder.doctype(raw),
            Ok(Token::StartTag(raw)) => {
                let tag = parse_start_tag(raw);
                let name = tag.name.clone();
                let self_closing = tag.self_closing;
                builder.start_tag(tag);

                let raw_text = is_raw_text_element(&name);
                if self_closing || !(raw_text || ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&name.as_str())) {
                    continue;
                }

                let rest = lexer.remainder();
                let end = find_closing_tag(rest, &name);
                let content = &rest[..end];
                if !content.is_empty() {
                    if raw_text {
                        builder.text(content);
                    } else {
                        builder.text(&decode_entities(content));
                    }
                }
                let close_len = rest[end..].find('>').map(|i| i + 1).unwrap_or(rest.len() - end);
                lexer.bump(end + close_len);
                builder.end_tag(&name);
            }
            Ok(Token::EndTag(raw)) => builder.end_tag(&parse_end_tag(raw)),
            Err(()) => builder.text(&decode_entities(lexer.slice())),
        }
    }

    builder.finish()
}

/// Byte offset of `</name` (case-insensitive) in `haystack`, or its length
fn find_closing_tag(haystack: &str, name: &str) -> usize {
    let lower = haystack.to_ascii_lowercase();
    let needle = format!("</{}", name);
    let mut from = 0;

    while let Some(found) = lower[from..].find(&needle) {
        let at = from + found;
        let after = lower.as_bytes().get(at + needle.len()).copied();
        match after {
            None | Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')
            | Some(b'\x0c') => return at,
            _ => from = at + needle.len(),
        }
    }

    haystack.len()
}

struct TreeBuilder {
    doc: Document,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let doc = Document::new();
        let root = doc.root();
        Self {
            doc,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();

        // Adjacent text (e.g. around a stray '<') is merged into one node
        if let Some(last) = self.doc.children(parent).last().copied() {
            if let Some(existing) = self.doc.text(last) {
                let merged = format!("{}{}", existing, text);
                self.doc.set_text(last, merged);
                return;
            }
        }

        let node = self.doc.create_text(text);
        self.doc.append_child(parent, node);
    }

    fn comment(&mut self, body: &str) {
        let node = self.doc.create_comment(body);
        let parent = self.current();
        self.doc.append_child(parent, node);
    }

    fn doctype(&mut self, raw: &str) {
        let body = raw
            .get(9..)
            .unwrap_or("")
            .trim_end_matches('>')
            .trim()
            .to_string();
        let node = self.doc.create_doctype(body);
        let parent = self.current();
        self.doc.append_child(parent, node);
    }

    fn start_tag(&mut self, tag: StartTag) {
        self.close_implied(&tag.name);

        let element = Element {
            name: tag.name,
            attrs: tag
                .attrs
                .into_iter()
                .map(|(name, value)| Attribute { name, value })
                .collect(),
        };
        let is_void = is_void_element(&element.name);
        let node = self.doc.create_element_with(element);
        let parent = self.current();
        self.doc.append_child(parent, node);

        if !is_void && !tag.self_closing {
            self.open.push(node);
        }
    }

    fn end_tag(&mut self, name: &str) {
        let position = self
            .open
            .iter()
            .skip(1)
            .rposition(|node| self.doc.name(*node) == Some(name));

        // `skip(1)` keeps the document node on the stack
        if let Some(pos) = position {
            self.open.truncate(pos + 1);
        }
    }

    /// Pop elements whose end tag is implied by the start tag `name`
    fn close_implied(&mut self, name: &str) {
        if name == "li" {
            self.close_up_to("li", &["ul", "ol", "menu"]);
        } else if name == "dt" || name == "dd" {
            if !self.close_up_to("dt", &["dl"]) {
                self.close_up_to("dd", &["dl"]);
            }
        }

        if CLOSES_PARAGRAPH.contains(&name) {
            let mut index = self.open.len();
            while index > 1 {
                index -= 1;
                match self.doc.name(self.open[index]) {
                    Some("p") => {
                        self.open.truncate(index);
                        break;
                    }
                    Some(tag) if PHRASING_ELEMENTS.contains(&tag) => continue,
                    _ => break,
                }
            }
        }
    }

    /// Close the nearest open `target` unless a `boundary` element is found
    /// first. Returns whether anything was closed.
    fn close_up_to(&mut self, target: &str, boundaries: &[&str]) -> bool {
        let mut index = self.open.len();
        while index > 1 {
            index -= 1;
            match self.doc.name(self.open[index]) {
                Some(tag) if tag == target => {
                    self.open.truncate(index);
                    return true;
                }
                Some(tag) if boundaries.contains(&tag) => return false,
                _ => {}
            }
        }
        false
    }

    fn finish(self) -> Document {
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(doc: &Document, parent: NodeId) -> Vec<String> {
        doc.element_children(parent)
            .filter_map(|n| doc.name(n).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse("<main><h1>Title</h1><p>Body <em>text</em></p></main>");
        let main = doc.first_element_by_name("main").unwrap();
        assert_eq!(names(&doc, main), vec!["h1", "p"]);
        assert_eq!(doc.text_content(main), "TitleBody text");
    }

    #[test]
    fn test_void_and_self_closing() {
        let doc = parse(r#"<main><img src="/a.jpg"><br/><p>after</p></main>"#);
        let main = doc.first_element_by_name("main").unwrap();
        assert_eq!(names(&doc, main), vec!["img", "br", "p"]);
    }

    #[test]
    fn test_implied_li_end() {
        let doc = parse("<ul><li>one<li>two</ul>");
        let ul = doc.first_element_by_name("ul").unwrap();
        assert_eq!(names(&doc, ul), vec!["li", "li"]);
    }

    #[test]
    fn test_nested_list_does_not_close_outer_item() {
        let doc = parse("<ul><li>a<ul><li>b</li></ul></li></ul>");
        let ul = doc.first_element_by_name("ul").unwrap();
        assert_eq!(names(&doc, ul), vec!["li"]);
    }

    #[test]
    fn test_block_closes_paragraph() {
        let doc = parse("<main><p>one<div>two</div></main>");
        let main = doc.first_element_by_name("main").unwrap();
        assert_eq!(names(&doc, main), vec!["p", "div"]);
    }

    #[test]
    fn test_script_content_is_raw() {
        let source = "<script>if (a < b && c) { x = '</div>'; }</script><p>x</p>";
        let doc = parse(source);
        let script = doc.first_element_by_name("script").unwrap();
        assert_eq!(doc.text_content(script), "if (a < b && c) { x = '</div>'; }");
        assert!(doc.first_element_by_name("p").is_some());
    }

    #[test]
    fn test_comments_and_doctype() {
        let doc = parse("<!DOCTYPE html><!-- a -- b --><p>x</p>");
        assert_eq!(doc.to_html(), "<!DOCTYPE html><!-- a -- b --><p>x</p>");
    }

    #[test]
    fn test_stray_end_tag_ignored() {
        let doc = parse("<div>a</span>b</div>");
        assert_eq!(doc.to_html(), "<div>ab</div>");
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let doc = parse("<p>1 < 2</p>");
        let p = doc.first_element_by_name("p").unwrap();
        assert_eq!(doc.text_content(p), "1 < 2");
    }

    #[test]
    fn test_unclosed_elements_close_at_eof() {
        let doc = parse("<main><div><p>open");
        let p = doc.first_element_by_name("p").unwrap();
        assert_eq!(doc.text_content(p), "open");
    }
}
