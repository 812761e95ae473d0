use crate::config::MapperConfig;
use crate::diagnostic::Diagnostic;
use crate::embedder::{EmbedOutput, SourceMap};
use crate::error::Result;
use crate::mapping::{Mapping, MappingOutcome};
use crate::marker::MarkerRecord;
use crate::orchestrator::PerformanceMetrics;
use crate::path::{path_of, resolve, StructuralPath};
use pagemap_dom::{Document, NodeId, Selector};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A live element and its path below the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedElement {
    pub element: NodeId,
    pub path: StructuralPath,
}

/// A source element and the rendered element it became
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPair {
    pub marker: String,
    pub source: MappedElement,
    pub rendered: MappedElement,
}

/// Everything a mapping run produced, ready to be frozen into a service
pub struct ServiceParts {
    pub config: MapperConfig,
    pub embed: EmbedOutput,
    pub rendered_html: String,
    pub rendered_doc: Document,
    pub outcome: MappingOutcome,
    pub metrics: PerformanceMetrics,
}

/// Query façade over a finished mapping. Immutable once built.
pub struct MapperService {
    config: MapperConfig,
    root_selector: Selector,
    source_doc: Document,
    rendered_doc: Document,
    marked_html: String,
    rendered_html: String,
    records: BTreeMap<String, MarkerRecord>,
    source_paths: SourceMap,
    mapping: Mapping,
    /// Rendered path key to marker
    by_rendered: HashMap<String, String>,
    /// Source path key to marker
    by_source: HashMap<String, String>,
    diagnostics: Vec<Diagnostic>,
    metrics: PerformanceMetrics,
}

impl MapperService {
    pub fn from_parts(parts: ServiceParts) -> Result<Self> {
        let ServiceParts {
            config,
            embed,
            rendered_html,
            rendered_doc,
            outcome,
            metrics,
        } = parts;

        let root_selector = config.root()?;

        // Embed order, so that on a shared path the last embedded marker wins
        let mut by_rendered = HashMap::new();
        let mut by_source = HashMap::new();
        for marker in &embed.embed_order {
            let Some(entry) = outcome.mapping.get(marker) else {
                continue;
            };
            index_marker(&mut by_rendered, entry.rendered.key(), marker);
            index_marker(&mut by_source, entry.source.key(), marker);
        }

        let mut diagnostics = embed.diagnostics;
        diagnostics.extend(outcome.diagnostics);

        Ok(Self {
            config,
            root_selector,
            source_doc: embed.source_doc,
            rendered_doc,
            marked_html: embed.marked_html,
            rendered_html,
            records: embed.records,
            source_paths: embed.source_paths,
            mapping: outcome.mapping,
            by_rendered,
            by_source,
            diagnostics,
            metrics,
        })
    }

    fn source_root(&self) -> Option<NodeId> {
        self.source_doc.select_first(self.source_doc.root(), &self.root_selector)
    }

    fn rendered_root(&self, doc: &Document) -> Option<NodeId> {
        doc.select_first(doc.root(), &self.root_selector)
    }

    /// Source element a rendered element came from
    pub fn find_source_element(&self, rendered_doc: &Document, element: NodeId) -> Option<NodeId> {
        if !rendered_doc.is_element(element) {
            return None;
        }
        let rendered_root = self.rendered_root(rendered_doc)?;
        let path = path_of(rendered_doc, element, rendered_root);
        let marker = self.by_rendered.get(&path.key())?;
        let source_path = self.source_paths.get(marker)?;
        let source_root = self.source_root()?;
        resolve(&self.source_doc, source_root, source_path)
    }

    /// Rendered element a source element became
    pub fn find_rendered_element(&self, rendered_doc: &Document, source_element: NodeId) -> Option<NodeId> {
        if !self.source_doc.is_element(source_element) {
            return None;
        }
        let source_root = self.source_root()?;
        let path = path_of(&self.source_doc, source_element, source_root);
        let marker = self.by_source.get(&path.key())?;
        let entry = self.mapping.get(marker)?;
        let rendered_root = self.rendered_root(rendered_doc)?;
        resolve(rendered_doc, rendered_root, &entry.rendered)
    }

    /// Every mapping entry that still resolves on both sides. Uses the
    /// captured rendered document when `rendered_doc` is `None`.
    pub fn get_all_mapped_elements(&self, rendered_doc: Option<&Document>) -> Vec<MappedPair> {
        let target = rendered_doc.unwrap_or(&self.rendered_doc);
        let (Some(source_root), Some(rendered_root)) = (self.source_root(), self.rendered_root(target)) else {
            return Vec::new();
        };

        let mut pairs = Vec::with_capacity(self.mapping.len());
        for (marker, entry) in self.mapping.iter() {
            let Some(source) = resolve(&self.source_doc, source_root, &entry.source) else {
                debug!(marker = %marker, path = %entry.source, "Source path no longer resolves");
                continue;
            };
            let Some(rendered) = resolve(target, rendered_root, &entry.rendered) else {
                debug!(marker = %marker, path = %entry.rendered, "Rendered path no longer resolves");
                continue;
            };
            pairs.push(MappedPair {
                marker: marker.to_string(),
                source: MappedElement {
                    element: source,
                    path: entry.source.clone(),
                },
                rendered: MappedElement {
                    element: rendered,
                    path: entry.rendered.clone(),
                },
            });
        }
        pairs
    }

    /// The marked source document
    pub fn source_document(&self) -> &Document {
        &self.source_doc
    }

    /// The rendered document captured during initialization
    pub fn rendered_document(&self) -> &Document {
        &self.rendered_doc
    }

    pub fn marked_html(&self) -> &str {
        &self.marked_html
    }

    pub fn rendered_html(&self) -> &str {
        &self.rendered_html
    }

    /// Original content behind a marker
    pub fn marker_record(&self, marker: &str) -> Option<&MarkerRecord> {
        self.records.get(marker)
    }

    pub fn source_paths(&self) -> &SourceMap {
        &self.source_paths
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Number of mapped markers
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

fn index_marker(index: &mut HashMap<String, String>, key: String, marker: &str) {
    if let Some(replaced) = index.insert(key, marker.to_string()) {
        debug!(replaced = %replaced, kept = %marker, "Two markers share a path");
    }
}
