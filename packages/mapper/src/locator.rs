//! Finds markers that survived rendering

use crate::error::{MapperError, Result};
use crate::path::{path_of, StructuralPath};
use pagemap_dom::{Document, NodeData, NodeId};
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Where a marker ended up in the rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedMarker {
    pub element: NodeId,
    pub path: StructuralPath,
}

/// Marker to rendered element, recorded at locate time
pub type RenderedMap = BTreeMap<String, LocatedMarker>;

/// Lexical pattern of markers carrying `prefix`
pub fn marker_pattern(prefix: &str) -> Result<Regex> {
    let pattern = format!(r"\b{}[A-Z0-9]+_[a-zA-Z0-9]+_[A-Z]+\b", regex::escape(prefix));
    Regex::new(&pattern).map_err(|e| MapperError::Config(format!("Invalid marker pattern: {}", e)))
}

/// Collect every marker under `root` (inclusive), in document order.
///
/// Text markers resolve to the enclosing element; when the same marker shows
/// up more than once the deepest enclosing element wins. `img[src]` markers
/// resolve to the image and the first occurrence wins.
#[instrument(skip(doc, root), fields(root = root.index()))]
pub fn locate_markers(doc: &Document, root: NodeId, prefix: &str) -> Result<RenderedMap> {
    let pattern = marker_pattern(prefix)?;
    let mut found = RenderedMap::new();

    for node in std::iter::once(root).chain(doc.descendants(root)) {
        match doc.data(node) {
            NodeData::Text(text) => {
                let Some(parent) = doc.parent(node).filter(|p| doc.is_element(*p)) else {
                    continue;
                };
                for m in pattern.find_iter(text) {
                    let marker = m.as_str();
                    if !marker.starts_with(prefix) {
                        continue;
                    }
                    let path = path_of(doc, parent, root);
                    let deeper = found
                        .get(marker)
                        .map(|existing| path.len() > existing.path.len())
                        .unwrap_or(true);
                    if deeper {
                        found.insert(
                            marker.to_string(),
                            LocatedMarker {
                                element: parent,
                                path,
                            },
                        );
                    }
                }
            }
            NodeData::Element(el) if el.name == "img" => {
                let Some(src) = el.attr("src") else {
                    continue;
                };
                for m in pattern.find_iter(src) {
                    let marker = m.as_str();
                    if marker.starts_with(prefix) && !found.contains_key(marker) {
                        found.insert(
                            marker.to_string(),
                            LocatedMarker {
                                element: node,
                                path: path_of(doc, node, root),
                            },
                        );
                    }
                }
            }
            _ => {}
        }
    }

    debug!(markers = found.len(), "Located rendered markers");
    Ok(found)
}
