//! Markup tokenizer built on logos
//!
//! The main lexer only recognises the coarse shape of the markup (tags, text,
//! comment openers, doctypes). Context-sensitive pieces such as comment bodies
//! and raw-text element contents are scanned by the tree builder straight from
//! the lexer remainder.

use logos::Logos;

/// Top-level markup tokens
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token<'src> {
    #[token("<!--")]
    CommentOpen,

    #[regex(r"<![dD][oO][cC][tT][yY][pP][eE][^>]*>", |lex| lex.slice())]
    Doctype(&'src str),

    #[regex(
        r#"<[a-zA-Z][a-zA-Z0-9:_-]*([ \t\n\r\f]+[^ \t\n\r\f"'>/=]+([ \t\n\r\f]*=[ \t\n\r\f]*("[^"]*"|'[^']*'|[^ \t\n\r\f"'=<>`]+))?)*[ \t\n\r\f]*/?>"#,
        |lex| lex.slice()
    )]
    StartTag(&'src str),

    #[regex(r"</[a-zA-Z][a-zA-Z0-9:_-]*[ \t\n\r\f]*>", |lex| lex.slice())]
    EndTag(&'src str),

    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),
}

/// Tokens inside a start tag, after the tag name has been removed
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
enum AttrToken<'src> {
    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    DoubleQuoted(&'src str),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    SingleQuoted(&'src str),

    #[regex(r#"[^ \t\n\r\f"'=]+"#, |lex| lex.slice())]
    Word(&'src str),
}

/// A start tag broken into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

/// Split a raw start tag (`<img src="a" />`) into name, attributes and the
/// self-closing flag. Names are lower-cased and values entity-decoded.
pub fn parse_start_tag(raw: &str) -> StartTag {
    let inner = raw.trim_start_matches('<').trim_end_matches('>');
    let trimmed = inner.trim_end();
    let self_closing = trimmed.ends_with('/');
    let inner = trimmed.trim_end_matches('/');

    let name_end = inner
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(inner.len());
    let name = inner[..name_end].to_ascii_lowercase();

    StartTag {
        name,
        attrs: parse_attributes(&inner[name_end..]),
        self_closing,
    }
}

/// Extract the lower-cased tag name from a raw end tag (`</div >`)
pub fn parse_end_tag(raw: &str) -> String {
    raw.trim_start_matches("</")
        .trim_end_matches('>')
        .trim()
        .to_ascii_lowercase()
}

fn parse_attributes(source: &str) -> Vec<(String, String)> {
    let tokens: Vec<AttrToken> = AttrToken::lexer(source).filter_map(|t| t.ok()).collect();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let name = match &tokens[pos] {
            AttrToken::Word(word) => word.to_ascii_lowercase(),
            _ => {
                pos += 1;
                continue;
            }
        };
        pos += 1;

        let mut value = String::new();
        if tokens.get(pos) == Some(&AttrToken::Equals) {
            pos += 1;
            match tokens.get(pos) {
                Some(AttrToken::DoubleQuoted(v))
                | Some(AttrToken::SingleQuoted(v))
                | Some(AttrToken::Word(v)) => {
                    value = decode_entities(v);
                    pos += 1;
                }
                _ => {}
            }
        }

        if name == "/" || attrs.iter().any(|(existing, _)| existing == &name) {
            continue;
        }
        attrs.push((name, value));
    }

    attrs
}

/// Decode the character references that appear in real-world page markup.
/// Unknown references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            decode_entity(entity).map(|c| (c, end + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
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

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let hex = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'));
        let code = match hex {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "copy" => Some('©'),
        "reg" => Some('®'),
        "hellip" => Some('…'),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        _ => None,
    }
}
