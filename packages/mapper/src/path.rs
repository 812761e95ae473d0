//! Structural paths
//!
//! A path is the list of `{tag, index}` steps leading from a fixed root down
//! to an element, where `index` counts element siblings only. Paths are the
//! coordinate system shared by the source and rendered documents; markers are
//! what tie a source path to its rendered counterpart.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pagemap_dom::{Document, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a [`StructuralPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    /// Upper-case tag name
    pub tag: String,
    /// Position among the parent's element children
    pub index: usize,
}

impl PathStep {
    pub fn new(tag: impl Into<String>, index: usize) -> Self {
        Self {
            tag: tag.into().to_ascii_uppercase(),
            index,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralPath(Vec<PathStep>);

impl StructuralPath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `TAG[i]>TAG[j]` form used as a lookup key
    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|step| format!("{}[{}]", step.tag, step.index))
            .collect::<Vec<_>>()
            .join(">")
    }

    /// Base64 of the JSON step array; empty for the empty path
    pub fn to_portable(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        match serde_json::to_string(&self.0) {
            Ok(json) => STANDARD.encode(json),
            Err(_) => String::new(),
        }
    }

    pub fn from_portable(encoded: &str) -> Option<Self> {
        if encoded.is_empty() {
            return Some(Self::default());
        }
        let bytes = STANDARD.decode(encoded).ok()?;
        let steps: Vec<PathStep> = serde_json::from_slice(&bytes).ok()?;
        Some(Self(steps))
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

fn element_index(doc: &Document, parent: NodeId, child: NodeId) -> Option<usize> {
    doc.element_children(parent).position(|c| c == child)
}

/// Path from `root` down to `element`. Empty when they are the same node.
///
/// When `element` is not below `root` the walk stops at its top-level
/// ancestor, whose index is looked up among `root`'s children and then
/// among its own parent's.
pub fn path_of(doc: &Document, element: NodeId, root: NodeId) -> StructuralPath {
    let mut steps = Vec::new();
    let mut current = element;

    while current != root {
        let tag = doc.tag_name(current).unwrap_or_default();
        match doc.parent_element(current) {
            Some(parent) if parent != root => {
                let index = element_index(doc, parent, current).unwrap_or(0);
                steps.push(PathStep { tag, index });
                current = parent;
            }
            _ => {
                let index = element_index(doc, root, current)
                    .or_else(|| doc.parent(current).and_then(|p| element_index(doc, p, current)))
                    .unwrap_or(0);
                steps.push(PathStep { tag, index });
                break;
            }
        }
    }

    steps.reverse();
    StructuralPath(steps)
}

/// Follow `path` down from `root`. Any missing child or tag mismatch gives `None`.
pub fn resolve(doc: &Document, root: NodeId, path: &StructuralPath) -> Option<NodeId> {
    let mut current = root;
    for step in path.steps() {
        let candidate = doc.element_children(current).nth(step.index)?;
        if doc.tag_name(candidate).as_deref() != Some(step.tag.as_str()) {
            return None;
        }
        current = candidate;
    }
    Some(current)
}
