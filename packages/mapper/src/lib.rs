//! # Pagemap
//!
//! Maps elements of a source document to the elements that represent them
//! after an opaque rendering pipeline has decorated the page.
//!
//! ## How it works
//!
//! 1. Every target element in the source gets a unique marker token, either
//!    in its text content or, for images, in its `src`.
//! 2. The marked document goes through a render strategy: the live page in
//!    headless Chrome, an in-process decorator chain, or a custom adapter.
//! 3. Markers are located again in the rendered page and joined with their
//!    source paths into a [`Mapping`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pagemap::{MapperConfig, Orchestrator, RenderOptions, RendererRegistry};
//!
//! # async fn run(source: &str) -> pagemap::Result<()> {
//! let config = MapperConfig::default()
//!     .with_render_mode("page")
//!     .with_render_options(RenderOptions::default().with_url("https://example.com/page"));
//!
//! let service = Orchestrator::new(RendererRegistry::with_defaults())
//!     .initialize_mapper(source, &config)
//!     .await?;
//!
//! for pair in service.get_all_mapped_elements(None) {
//!     println!("{} -> {}", pair.source.path, pair.rendered.path);
//! }
//! # Ok(())
//! # }
//! ```

mod annotate;
mod config;
mod diagnostic;
mod embedder;
mod error;
mod locator;
mod mapping;
mod marker;
mod orchestrator;
mod path;
pub mod render;
mod service;

pub use annotate::{AnnotationReport, PATH_TO_SOURCE_ATTR};
pub use config::{MapperConfig, RenderOptions, DEFAULT_CONFIG_NAME};
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticLevel};
pub use embedder::{
    embed_source_markers, embed_with_generator, EmbedOutput, SourceMap, MARKER_IDS_ATTR, SOURCE_MARKED_ATTR,
};
pub use error::{MapperError, RenderError, RenderResult, Result};
pub use locator::{locate_markers, marker_pattern, LocatedMarker, RenderedMap};
pub use mapping::{build_mapping, Mapping, MappingEntry, MappingOutcome};
pub use marker::{element_tag, ContentKind, MarkerGenerator, MarkerRecord, RecordKind};
pub use orchestrator::{initialize_mapper, Orchestrator, PerformanceMetrics};
pub use path::{path_of, resolve, PathStep, StructuralPath};
pub use render::{RenderAdapter, RenderStrategy, RendererRegistry, WaitCondition};
pub use service::{MappedElement, MappedPair, MapperService, ServiceParts};

pub use pagemap_dom::{Document, NodeId};
