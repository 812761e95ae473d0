//! Marker embedding
//!
//! Every target element under the root gets a marker that stands in for (or
//! is prepended to) its original content. Candidates are processed deepest
//! first so that paths recorded for inner elements are taken before their
//! ancestors are rewritten.

use crate::config::MapperConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::Result;
use crate::marker::{ContentKind, MarkerGenerator, MarkerRecord};
use crate::path::{path_of, StructuralPath};
use pagemap_dom::{Document, NodeId};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Marker to source path, recorded at embed time
pub type SourceMap = BTreeMap<String, StructuralPath>;

pub const MARKER_IDS_ATTR: &str = "data-marker-ids";
pub const SOURCE_MARKED_ATTR: &str = "data-source-marked";

#[derive(Debug, Clone)]
pub struct EmbedOutput {
    /// Serialization of the marked document
    pub marked_html: String,
    pub records: BTreeMap<String, MarkerRecord>,
    pub source_paths: SourceMap,
    /// Markers in the order they were embedded
    pub embed_order: Vec<String>,
    /// The marked source document
    pub source_doc: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// Embed markers using a fresh generator
pub fn embed_source_markers(source: &str, config: &MapperConfig) -> Result<EmbedOutput> {
    let mut generator = MarkerGenerator::new(config.marker_prefix.clone(), config.marker_id_length);
    embed_with_generator(source, config, &mut generator)
}

#[instrument(skip_all, fields(root = %config.root_selector))]
pub fn embed_with_generator(
    source: &str,
    config: &MapperConfig,
    generator: &mut MarkerGenerator,
) -> Result<EmbedOutput> {
    let root_selector = config.root()?;
    let targets = config.targets()?;

    let mut doc = Document::parse(source);
    let mut records = BTreeMap::new();
    let mut source_paths = SourceMap::new();
    let mut embed_order = Vec::new();

    let Some(root) = doc.select_first(doc.root(), &root_selector) else {
        let diagnostic = Diagnostic::warning(
            DiagnosticKind::MissingSourceRoot,
            format!("No {} element found in source markup", config.root_selector),
        );
        diagnostic.emit();
        return Ok(EmbedOutput {
            marked_html: source.to_string(),
            records,
            source_paths,
            embed_order,
            source_doc: doc,
            diagnostics: vec![diagnostic],
        });
    };

    let mut candidates = doc.select(root, &targets);
    candidates.sort_by_key(|node| Reverse(depth(&doc, *node, root)));
    debug!(candidates = candidates.len(), "Collected target elements");

    // Element each marker was attached to, for the reachability check below
    let mut marked_elements: Vec<(String, NodeId)> = Vec::new();

    for element in candidates {
        let Some(tag) = doc.tag_name(element) else {
            continue;
        };
        let mut element_markers = Vec::new();

        match tag.as_str() {
            "IMG" => {
                let src = doc.get_attribute(element, "src").unwrap_or("").to_string();
                if !src.is_empty() {
                    let marker = generator.next_marker(&tag, ContentKind::Src);
                    records.insert(marker.clone(), MarkerRecord::attribute("src", src, tag.clone()));
                    doc.set_attribute(element, "src", marker.clone());
                    element_markers.push(marker);
                }
            }
            "UL" | "OL" => {
                let items: Vec<NodeId> = doc
                    .element_children(element)
                    .filter(|child| doc.name(*child) == Some("li"))
                    .collect();

                for item in items {
                    let original = doc.inner_html(item);
                    if original.trim().is_empty() {
                        continue;
                    }
                    let marker = generator.next_marker("LI", ContentKind::Html);
                    records.insert(marker.clone(), MarkerRecord::html(original, "LI"));
                    doc.set_text_content(item, marker.clone());
                    source_paths.insert(marker.clone(), path_of(&doc, item, root));
                    embed_order.push(marker.clone());
                    doc.set_attribute(item, MARKER_IDS_ATTR, marker.clone());
                    doc.set_attribute(item, SOURCE_MARKED_ATTR, "true");
                    marked_elements.push((marker, item));
                }
            }
            _ => {
                let has_content =
                    !doc.text_content(element).trim().is_empty() || !doc.children(element).is_empty();
                if has_content {
                    let marker = generator.next_marker(&tag, ContentKind::Html);
                    records.insert(marker.clone(), MarkerRecord::html(doc.inner_html(element), tag.clone()));
                    let text = doc.create_text(format!("{} ", marker));
                    doc.prepend_child(element, text);
                    element_markers.push(marker);
                }
            }
        }

        if !element_markers.is_empty() {
            let path = path_of(&doc, element, root);
            doc.set_attribute(element, MARKER_IDS_ATTR, element_markers.join(","));
            doc.set_attribute(element, SOURCE_MARKED_ATTR, "true");
            for marker in element_markers {
                source_paths.insert(marker.clone(), path.clone());
                embed_order.push(marker.clone());
                marked_elements.push((marker, element));
            }
        }
    }

    // A list item rewrite discards whatever was marked inside the item
    for (marker, element) in marked_elements {
        if !doc.is_descendant_of(element, root) {
            debug!(marker = %marker, "Dropping marker replaced by an enclosing list item");
            source_paths.remove(&marker);
            records.remove(&marker);
        }
    }
    embed_order.retain(|marker| source_paths.contains_key(marker));

    let marked_html = doc.to_html();
    info!(markers = source_paths.len(), "Embedded source markers");

    Ok(EmbedOutput {
        marked_html,
        records,
        source_paths,
        embed_order,
        source_doc: doc,
        diagnostics: Vec::new(),
    })
}

/// Number of ancestors between `node` and `root`
fn depth(doc: &Document, node: NodeId, root: NodeId) -> usize {
    let mut depth = 0;
    let mut current = Some(node);
    while let Some(n) = current {
        if n == root {
            break;
        }
        depth += 1;
        current = doc.parent(n);
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::resolve;
    use pagemap_dom::Selector;

    fn embed(source: &str, targets: &[&str]) -> EmbedOutput {
        let config = MapperConfig::default().with_target_selectors(targets.iter().copied());
        let mut generator = MarkerGenerator::seeded("MARKER_", None, 42);
        embed_with_generator(source, &config, &mut generator).unwrap()
    }

    fn main_of(doc: &Document) -> NodeId {
        doc.select_first(doc.root(), &Selector::parse("main").unwrap()).unwrap()
    }

    #[test]
    fn test_img_src_replaced() {
        let out = embed(r#"<main><img src="/a.jpg" alt="a"></main>"#, &["img"]);
        assert_eq!(out.records.len(), 1);

        let (marker, record) = out.records.iter().next().unwrap();
        assert!(marker.starts_with("MARKER_IMG_"));
        assert!(marker.ends_with("_SRC"));
        assert_eq!(record, &MarkerRecord::attribute("src", "/a.jpg", "IMG"));

        let img = out.source_doc.first_element_by_name("img").unwrap();
        assert_eq!(out.source_doc.get_attribute(img, "src"), Some(marker.as_str()));
        assert_eq!(out.source_doc.get_attribute(img, MARKER_IDS_ATTR), Some(marker.as_str()));
        assert_eq!(out.source_doc.get_attribute(img, SOURCE_MARKED_ATTR), Some("true"));
        assert!(!out.marked_html.contains("/a.jpg"));
    }

    #[test]
    fn test_img_without_src_is_skipped() {
        let out = embed(r#"<main><img alt="none"></main>"#, &["img"]);
        assert!(out.records.is_empty());
        assert!(out.source_paths.is_empty());
    }

    #[test]
    fn test_text_marker_prepended() {
        let out = embed("<main><h1>Hello <em>world</em></h1></main>", &["h1"]);
        let (marker, record) = out.records.iter().next().unwrap();
        assert_eq!(record.value, "Hello <em>world</em>");
        assert_eq!(record.element, "H1");

        let h1 = out.source_doc.first_element_by_name("h1").unwrap();
        assert_eq!(out.source_doc.text_content(h1), format!("{} Hello world", marker));
        assert_eq!(out.source_paths[marker].key(), "H1[0]");
    }

    #[test]
    fn test_list_items_replaced() {
        let out = embed("<main><ul><li>one</li><li>  </li><li><b>three</b></li></ul></main>", &["ul"]);
        assert_eq!(out.records.len(), 2);

        let doc = &out.source_doc;
        let ul = doc.first_element_by_name("ul").unwrap();
        assert!(!doc.has_attribute(ul, MARKER_IDS_ATTR));

        let items: Vec<NodeId> = doc.element_children(ul).collect();
        let first = doc.get_attribute(items[0], MARKER_IDS_ATTR).unwrap();
        assert!(first.starts_with("MARKER_LI_") && first.ends_with("_HTML"));
        assert_eq!(doc.inner_html(items[0]), first);
        assert_eq!(out.source_paths[first].key(), "UL[0]>LI[0]");
        assert!(!doc.has_attribute(items[1], MARKER_IDS_ATTR));

        let third = doc.get_attribute(items[2], MARKER_IDS_ATTR).unwrap();
        assert_eq!(out.records[third].value, "<b>three</b>");
        assert_eq!(out.source_paths[third].key(), "UL[0]>LI[2]");
    }

    #[test]
    fn test_empty_element_not_marked() {
        let out = embed("<main><p></p><p>x</p></main>", &["p"]);
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_missing_root_returns_input() {
        let source = "<div><p>x</p></div>";
        let out = embed(source, &["p"]);
        assert_eq!(out.marked_html, source);
        assert!(out.records.is_empty());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::MissingSourceRoot);
    }

    #[test]
    fn test_every_path_resolves_in_marked_tree() {
        let source = r#"<main>
            <section><h2>Title</h2><p>Intro <img src="/i.png"></p></section>
            <div><p>Nested <span>deep</span></p><ol><li>a</li><li><p>b</p></li></ol></div>
            <p>Tail</p>
        </main>"#;
        let out = embed(source, &["h2", "p", "img", "ol"]);
        assert!(!out.source_paths.is_empty());

        let root = main_of(&out.source_doc);
        for (marker, path) in &out.source_paths {
            let element = resolve(&out.source_doc, root, path);
            assert!(element.is_some(), "{} at {}", marker, path);
            let ids = out.source_doc.get_attribute(element.unwrap(), MARKER_IDS_ATTR).unwrap();
            assert!(ids.split(',').any(|m| m == marker));
        }

        // The serialized form yields the same paths
        let reparsed = Document::parse(&out.marked_html);
        let root = main_of(&reparsed);
        for path in out.source_paths.values() {
            assert!(resolve(&reparsed, root, path).is_some());
        }
    }

    #[test]
    fn test_marks_inside_rewritten_item_are_dropped() {
        let out = embed("<main><ul><li><p>inner</p></li></ul></main>", &["p", "ul"]);
        assert_eq!(out.source_paths.len(), 1);
        assert!(out.source_paths.keys().all(|m| m.starts_with("MARKER_LI_")));
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_embed_order_follows_processing() {
        let out = embed("<main><h1>a</h1><div><p>b</p></div><p>c</p></main>", &["h1", "p"]);
        let paths: Vec<String> = out.embed_order.iter().map(|m| out.source_paths[m].key()).collect();
        assert_eq!(paths, vec!["DIV[1]>P[0]", "H1[0]", "P[2]"]);

        let out = embed("<main><ul><li><p>inner</p></li></ul></main>", &["p", "ul"]);
        assert_eq!(out.embed_order.len(), 1);
    }

    #[test]
    fn test_single_character_ids_on_large_page() {
        let source = format!("<main>{}</main>", "<p>x</p>".repeat(63));
        let config = MapperConfig::default();
        let mut generator = MarkerGenerator::seeded("MARKER_", Some(1), 1);

        let out = embed_with_generator(&source, &config, &mut generator).unwrap();
        assert_eq!(out.source_paths.len(), 63);
        assert_eq!(out.embed_order.len(), 63);
    }

    #[test]
    fn test_invalid_selector_is_fatal() {
        let config = MapperConfig::default().with_target_selectors(["p:hover"]);
        assert!(embed_source_markers("<main></main>", &config).is_err());
    }
}
