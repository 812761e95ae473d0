//! CSS selector subset
//!
//! Supported: selector lists (`a, b`), descendant and child combinators,
//! type and universal selectors, `#id`, `.class`, attribute selectors
//! (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`) and `:not(<compound>)`.

use crate::error::{SelectorError, SelectorResult};
use crate::node::{Document, Element, NodeId};
use std::fmt;

/// A parsed selector list
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compounds stored right-to-left; `combinators[i]` joins `compounds[i]` to
/// `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    parts: Vec<Simple>,
}

#[derive(Debug, Clone, PartialEq)]
enum Simple {
    Id(String),
    Class(String),
    Attr { name: String, op: AttrOp },
    Not(Box<Compound>),
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

impl Selector {
    pub fn parse(source: &str) -> SelectorResult<Self> {
        let mut parser = SelectorParser::new(source);
        let alternatives = parser.parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// Join several selectors into one list (`h1, p, img`)
    pub fn parse_list<S: AsRef<str>>(sources: &[S]) -> SelectorResult<Self> {
        let joined = sources
            .iter()
            .map(|s| s.as_ref().trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether element `id` matches any alternative
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if !doc.is_element(id) {
            return false;
        }
        self.alternatives
            .iter()
            .any(|complex| matches_complex(doc, id, complex, 0))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn matches_complex(doc: &Document, id: NodeId, complex: &Complex, index: usize) -> bool {
    let Some(el) = doc.element(id) else {
        return false;
    };
    if !matches_compound(el, &complex.compounds[index]) {
        return false;
    }
    if index + 1 == complex.compounds.len() {
        return true;
    }

    match complex.combinators[index] {
        Combinator::Child => doc
            .parent_element(id)
            .map(|parent| matches_complex(doc, parent, complex, index + 1))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut ancestor = doc.parent_element(id);
            while let Some(candidate) = ancestor {
                if matches_complex(doc, candidate, complex, index + 1) {
                    return true;
                }
                ancestor = doc.parent_element(candidate);
            }
            false
        }
    }
}

fn matches_compound(el: &Element, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if !el.name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    compound.parts.iter().all(|part| match part {
        Simple::Id(id) => el.id() == Some(id.as_str()),
        Simple::Class(class) => el.has_class(class),
        Simple::Attr { name, op } => match (el.attr(name), op) {
            (None, _) => false,
            (Some(_), AttrOp::Exists) => true,
            (Some(v), AttrOp::Equals(expected)) => v == expected,
            (Some(v), AttrOp::Includes(expected)) => v.split_ascii_whitespace().any(|w| w == expected),
            (Some(v), AttrOp::Prefix(expected)) => !expected.is_empty() && v.starts_with(expected.as_str()),
            (Some(v), AttrOp::Suffix(expected)) => !expected.is_empty() && v.ends_with(expected.as_str()),
            (Some(v), AttrOp::Contains(expected)) => !expected.is_empty() && v.contains(expected.as_str()),
        },
        Simple::Not(inner) => !matches_compound(el, inner),
    })
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, expected: char) -> SelectorResult<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(SelectorError::unexpected_char(self.source, self.pos, c)),
            None => Err(SelectorError::unexpected_end(self.source)),
        }
    }

    fn parse_list(&mut self) -> SelectorResult<Vec<Complex>> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(SelectorError::Empty);
        }

        let mut list = vec![self.parse_complex()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            self.skip_whitespace();
            list.push(self.parse_complex()?);
        }

        match self.peek() {
            None => Ok(list),
            Some(c) => Err(SelectorError::unexpected_char(self.source, self.pos, c)),
        }
    }

    fn parse_complex(&mut self) -> SelectorResult<Complex> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(',') | None => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(SelectorError::unexpected_char(self.source, self.pos, c)),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        compounds.reverse();
        combinators.reverse();
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> SelectorResult<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;

        match self.peek() {
            Some('*') => self.pos += 1,
            Some(c) if is_ident_char(c) => compound.tag = Some(self.parse_ident()?.to_ascii_lowercase()),
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.parts.push(Simple::Id(self.parse_ident()?));
                }
                Some('.') => {
                    self.pos += 1;
                    compound.parts.push(Simple::Class(self.parse_ident()?));
                }
                Some('[') => compound.parts.push(self.parse_attribute()?),
                Some(':') => compound.parts.push(self.parse_pseudo()?),
                _ => break,
            }
        }

        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(SelectorError::unexpected_char(self.source, self.pos, c)),
                None => Err(SelectorError::unexpected_end(self.source)),
            };
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> SelectorResult<Simple> {
        self.expect('[')?;
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(Simple::Attr {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => {
                self.pos += 1;
                '='
            }
            Some(c @ ('~' | '^' | '$' | '*')) => {
                self.pos += 1;
                self.expect('=')?;
                c
            }
            Some(c) => return Err(SelectorError::unexpected_char(self.source, self.pos, c)),
            None => return Err(SelectorError::unexpected_end(self.source)),
        };

        self.skip_whitespace();
        let value = self.parse_value()?;
        self.skip_whitespace();
        self.expect(']')?;

        let op = match op {
            '~' => AttrOp::Includes(value),
            '^' => AttrOp::Prefix(value),
            '$' => AttrOp::Suffix(value),
            '*' => AttrOp::Contains(value),
            _ => AttrOp::Equals(value),
        };
        Ok(Simple::Attr { name, op })
    }

    fn parse_pseudo(&mut self) -> SelectorResult<Simple> {
        self.expect(':')?;
        let name = self.parse_ident()?.to_ascii_lowercase();
        if name != "not" {
            return Err(SelectorError::unsupported_pseudo(self.source, name));
        }
        self.expect('(')?;
        self.skip_whitespace();
        let inner = self.parse_compound()?;
        self.skip_whitespace();
        self.expect(')')?;
        Ok(Simple::Not(Box::new(inner)))
    }

    fn parse_value(&mut self) -> SelectorResult<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        let value: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(value);
                    }
                    self.pos += 1;
                }
                Err(SelectorError::unexpected_end(self.source))
            }
            _ => self.parse_ident(),
        }
    }

    fn parse_ident(&mut self) -> SelectorResult<String> {
        let start = self.pos;
        while self.peek().map(is_ident_char).unwrap_or(false) {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(SelectorError::unexpected_char(self.source, self.pos, c)),
                None => Err(SelectorError::unexpected_end(self.source)),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_names(html: &str, selector: &str) -> Vec<String> {
        let doc = Document::parse(html);
        let selector = Selector::parse(selector).unwrap();
        doc.select(doc.root(), &selector)
            .into_iter()
            .map(|n| {
                let el = doc.element(n).unwrap();
                match el.id() {
                    Some(id) => format!("{}#{}", el.name, id),
                    None => el.name.clone(),
                }
            })
            .collect()
    }

    #[test]
    fn test_type_and_list() {
        let html = "<main><h1 id=a></h1><p id=b></p><img id=c></main>";
        assert_eq!(select_names(html, "img, h1"), vec!["h1#a", "img#c"]);
    }

    #[test]
    fn test_attribute_value() {
        let html = r#"<main><p id=a contenteditable="true"></p><p id=b contenteditable="false"></p></main>"#;
        assert_eq!(select_names(html, r#"[contenteditable="true"]"#), vec!["p#a"]);
        assert_eq!(select_names(html, "[contenteditable]").len(), 2);
    }

    #[test]
    fn test_descendant_and_not() {
        let html = r#"<main><div class="section" id=a data-status="loading"></div><div class="section" id=b></div></main><div class="section" id=c></div>"#;
        assert_eq!(
            select_names(html, "main .section:not([data-status])"),
            vec!["div#b"]
        );
    }

    #[test]
    fn test_child_combinator() {
        let html = "<ul id=u><li id=a><ul><li id=b></li></ul></li></ul>";
        assert_eq!(select_names(html, "#u > li"), vec!["li#a"]);
        assert_eq!(select_names(html, "#u li"), vec!["li#a", "li#b"]);
    }

    #[test]
    fn test_attribute_operators() {
        let html = r#"<a id=x href="https://site/a.pdf" class="btn primary"></a>"#;
        assert_eq!(select_names(html, "[href^=https]").len(), 1);
        assert_eq!(select_names(html, "[href$='.pdf']").len(), 1);
        assert_eq!(select_names(html, "[href*=site]").len(), 1);
        assert_eq!(select_names(html, "[class~=primary]").len(), 1);
        assert_eq!(select_names(html, "[class~=prim]").len(), 0);
    }

    #[test]
    fn test_select_excludes_scope() {
        let doc = Document::parse("<main><main id=inner></main></main>");
        let outer = doc.first_element_by_name("main").unwrap();
        let selector = Selector::parse("main").unwrap();
        let found = doc.select(outer, &selector);
        assert_eq!(found.len(), 1);
        assert_ne!(found[0], outer);
    }

    #[test]
    fn test_parse_list_joins() {
        let selector = Selector::parse_list(&["h1", " p ", ""]).unwrap();
        assert_eq!(selector.as_str(), "h1, p");
    }

    #[test]
    fn test_invalid_selectors() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("p:hover"),
            Err(SelectorError::UnsupportedPseudo { .. })
        ));
        assert!(matches!(
            Selector::parse("[data-x"),
            Err(SelectorError::UnexpectedEnd { .. })
        ));
        assert!(Selector::parse("h1,").is_err());
    }
}
