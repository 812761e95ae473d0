//! Marker tokens
//!
//! A marker looks like `MARKER_IMG_x7Qa2b_SRC`: prefix, element tag, random
//! alphanumeric id and content kind. Markers survive arbitrary rendering
//! because they ride along inside text content and `src` attributes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

const ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Consecutive collisions tolerated before ids grow by one character
const MAX_REDRAWS: usize = 16;

/// What a marker stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// An attribute value (`img[src]`)
    Src,
    /// Inner markup
    Html,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Src => "SRC",
            Self::Html => "HTML",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Attribute,
    Html,
}

/// Original content a marker replaced or annotated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,

    /// Attribute name for attribute records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub value: String,

    /// Upper-case tag of the marked element
    pub element: String,
}

impl MarkerRecord {
    pub fn attribute(name: impl Into<String>, value: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Attribute,
            name: Some(name.into()),
            value: value.into(),
            element: element.into(),
        }
    }

    pub fn html(value: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Html,
            name: None,
            value: value.into(),
            element: element.into(),
        }
    }
}

/// Per-run marker factory. Ids issued by one generator never repeat; once
/// the id space gets crowded, later ids are longer than configured.
pub struct MarkerGenerator {
    prefix: String,
    id_length: Option<usize>,
    /// Characters added to every id after repeated collisions
    growth: usize,
    issued: HashSet<String>,
    rng: StdRng,
}

impl MarkerGenerator {
    pub fn new(prefix: impl Into<String>, id_length: Option<usize>) -> Self {
        Self::with_rng(prefix, id_length, StdRng::from_entropy())
    }

    /// Deterministic generator for reproducible runs
    pub fn seeded(prefix: impl Into<String>, id_length: Option<usize>, seed: u64) -> Self {
        Self::with_rng(prefix, id_length, StdRng::seed_from_u64(seed))
    }

    fn with_rng(prefix: impl Into<String>, id_length: Option<usize>, rng: StdRng) -> Self {
        Self {
            prefix: prefix.into(),
            id_length,
            growth: 0,
            issued: HashSet::new(),
            rng,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of markers issued so far
    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    /// Next marker for an element with tag `tag`
    pub fn next_marker(&mut self, tag: &str, kind: ContentKind) -> String {
        let mut redraws = 0;
        let id = loop {
            let candidate = self.random_id();
            if !self.issued.contains(&candidate) {
                break candidate;
            }
            redraws += 1;
            if redraws == MAX_REDRAWS {
                self.growth += 1;
                redraws = 0;
                debug!(issued = self.issued.len(), growth = self.growth, "Marker ids exhausted, lengthening");
            }
        };
        self.issued.insert(id.clone());
        format!("{}{}_{}_{}", self.prefix, element_tag(tag), id, kind)
    }

    fn random_id(&mut self) -> String {
        let length = match self.id_length {
            Some(length) => length.max(1),
            None if self.rng.gen_bool(0.5) => 6,
            None => 8,
        } + self.growth;
        (0..length)
            .map(|_| ID_CHARS[self.rng.gen_range(0..ID_CHARS.len())] as char)
            .collect()
    }
}

/// Tag part of a marker: upper-cased, alphanumerics only
pub fn element_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(marker: &str) -> Vec<&str> {
        marker.trim_start_matches("MARKER_").split('_').collect()
    }

    #[test]
    fn test_marker_shape() {
        let mut gen = MarkerGenerator::seeded("MARKER_", None, 7);
        let marker = gen.next_marker("img", ContentKind::Src);

        assert!(marker.starts_with("MARKER_IMG_"));
        assert!(marker.ends_with("_SRC"));
        let id = parts(&marker)[1];
        assert!(id.len() == 6 || id.len() == 8);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_fixed_length() {
        let mut gen = MarkerGenerator::seeded("MARKER_", Some(12), 1);
        for _ in 0..20 {
            let marker = gen.next_marker("p", ContentKind::Html);
            assert_eq!(parts(&marker)[1].len(), 12);
        }
    }

    #[test]
    fn test_ids_unique_within_run() {
        // Single-character ids leave only 62 possibilities
        let mut gen = MarkerGenerator::seeded("MARKER_", Some(1), 3);
        let mut seen = HashSet::new();
        for _ in 0..62 {
            let marker = gen.next_marker("li", ContentKind::Html);
            assert!(seen.insert(parts(&marker)[1].to_string()));
        }
        assert_eq!(gen.issued(), 62);
    }

    #[test]
    fn test_exhausted_id_space_grows_ids() {
        let mut gen = MarkerGenerator::seeded("MARKER_", Some(1), 1);
        let markers: Vec<String> = (0..200).map(|_| gen.next_marker("p", ContentKind::Html)).collect();

        let unique: HashSet<&String> = markers.iter().collect();
        assert_eq!(unique.len(), 200);
        assert!(markers.iter().all(|m| parts(m)[1].len() <= 2));
        assert!(markers.iter().any(|m| parts(m)[1].len() == 2));
    }

    #[test]
    fn test_element_tag_strips_non_alphanumerics() {
        assert_eq!(element_tag("my-widget"), "MYWIDGET");
        assert_eq!(element_tag("h2"), "H2");
    }

    #[test]
    fn test_record_serialization() {
        let record = MarkerRecord::attribute("src", "/a.jpg", "IMG");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"type":"attribute","name":"src","value":"/a.jpg","element":"IMG"}"#);

        let record = MarkerRecord::html("<b>x</b>", "P");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"type":"html","value":"<b>x</b>","element":"P"}"#);
    }
}
