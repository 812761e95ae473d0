use crate::config::MapperConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::embedder::SourceMap;
use crate::error::Result;
use crate::locator::{locate_markers, RenderedMap};
use crate::path::StructuralPath;
use pagemap_dom::Document;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Source and rendered location of one marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub source: StructuralPath,
    pub rendered: StructuralPath,
}

/// Marker-keyed join of source and rendered paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: BTreeMap<String, MappingEntry>,
}

impl Mapping {
    /// Keep the markers present on both sides
    pub fn join(source: &SourceMap, rendered: &RenderedMap) -> Self {
        let entries = source
            .iter()
            .filter_map(|(marker, source_path)| {
                rendered.get(marker).map(|located| {
                    (
                        marker.clone(),
                        MappingEntry {
                            source: source_path.clone(),
                            rendered: located.path.clone(),
                        },
                    )
                })
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, marker: &str) -> Option<&MappingEntry> {
        self.entries.get(marker)
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.entries.contains_key(marker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappingEntry)> {
        self.entries.iter().map(|(marker, entry)| (marker.as_str(), entry))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingOutcome {
    pub mapping: Mapping,
    pub diagnostics: Vec<Diagnostic>,
}

impl MappingOutcome {
    fn degraded(diagnostic: Diagnostic) -> Self {
        diagnostic.emit();
        Self {
            mapping: Mapping::default(),
            diagnostics: vec![diagnostic],
        }
    }
}

/// Locate markers in the rendered document and join them with the source map.
/// Missing roots and an empty source map give an empty mapping plus a
/// diagnostic rather than an error.
#[instrument(skip_all, fields(markers = source_map.len()))]
pub fn build_mapping(
    rendered_doc: &Document,
    source_doc: &Document,
    source_map: &SourceMap,
    config: &MapperConfig,
) -> Result<MappingOutcome> {
    let root_selector = config.root()?;

    let Some(rendered_root) = rendered_doc.select_first(rendered_doc.root(), &root_selector) else {
        return Ok(MappingOutcome::degraded(Diagnostic::warning(
            DiagnosticKind::MissingRenderedRoot,
            format!("Cannot build mapping: missing {} element in rendered page", config.root_selector),
        )));
    };
    if source_doc.select_first(source_doc.root(), &root_selector).is_none() {
        return Ok(MappingOutcome::degraded(Diagnostic::warning(
            DiagnosticKind::MissingSourceRoot,
            format!("Cannot build mapping: missing {} element in source", config.root_selector),
        )));
    }
    if source_map.is_empty() {
        return Ok(MappingOutcome::degraded(Diagnostic::warning(
            DiagnosticKind::EmptySourceMap,
            "No markers registered in the source map",
        )));
    }

    let rendered = locate_markers(rendered_doc, rendered_root, &config.marker_prefix)?;
    let mapping = Mapping::join(source_map, &rendered);

    let diagnostics: Vec<Diagnostic> = source_map
        .keys()
        .filter(|marker| !mapping.contains(marker))
        .map(|marker| {
            Diagnostic::info(DiagnosticKind::UnmatchedMarker, "Marker did not survive rendering")
                .with_marker(marker.clone())
        })
        .collect();
    for diagnostic in &diagnostics {
        diagnostic.emit();
    }

    debug!(
        mapped = mapping.len(),
        unmatched = diagnostics.len(),
        "Built page mapping"
    );
    Ok(MappingOutcome {
        mapping,
        diagnostics,
    })
}
