//! Live annotation of rendered elements
//!
//! Mapped rendered elements get a `data-path-to-source` attribute carrying
//! the portable source path, and selected source attributes that rendering
//! may have dropped are copied back onto them.

use crate::service::MapperService;
use pagemap_dom::Document;
use tracing::info;

pub const PATH_TO_SOURCE_ATTR: &str = "data-path-to-source";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    /// Rendered elements that received a source path
    pub annotated: usize,
    /// Attributes copied from source elements
    pub restored_attributes: usize,
    /// Mapping entries that no longer resolve in the document
    pub skipped: usize,
}

impl MapperService {
    pub fn apply_live_attributes(&self, rendered_doc: &mut Document) -> AnnotationReport {
        let pairs = self.get_all_mapped_elements(Some(&*rendered_doc));
        let mut report = AnnotationReport {
            skipped: self.len().saturating_sub(pairs.len()),
            ..Default::default()
        };

        for pair in &pairs {
            rendered_doc.set_attribute(pair.rendered.element, PATH_TO_SOURCE_ATTR, pair.source.path.to_portable());
            report.annotated += 1;

            for name in &self.config().restore_attributes {
                if let Some(value) = self.source_document().get_attribute(pair.source.element, name) {
                    rendered_doc.set_attribute(pair.rendered.element, name, value);
                    report.restored_attributes += 1;
                }
            }
        }

        info!(
            annotated = report.annotated,
            restored = report.restored_attributes,
            skipped = report.skipped,
            "Applied live element attributes"
        );
        report
    }
}
