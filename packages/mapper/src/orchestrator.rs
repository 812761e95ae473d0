//! Embed → render → map, producing a [`MapperService`]

use crate::config::MapperConfig;
use crate::embedder::embed_source_markers;
use crate::error::Result;
use crate::mapping::build_mapping;
use crate::render::RendererRegistry;
use crate::service::{MapperService, ServiceParts};
use pagemap_dom::Document;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Phase timings of one mapping run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub embedding: Duration,
    pub rendering: Duration,
    pub mapping: Duration,
    pub total: Duration,
    pub element_mapping_count: usize,
}

impl PerformanceMetrics {
    pub fn log(&self) {
        info!(
            embedding_ms = millis(self.embedding),
            rendering_ms = millis(self.rendering),
            mapping_ms = millis(self.mapping),
            total_ms = millis(self.total),
            element_mapping_count = self.element_mapping_count,
            "Page mapper performance"
        );
    }
}

fn millis(d: Duration) -> f64 {
    (d.as_secs_f64() * 100_000.0).round() / 100.0
}

pub struct Orchestrator {
    registry: RendererRegistry,
}

impl Orchestrator {
    pub fn new(registry: RendererRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// Run the whole pipeline over `source`. Failures are logged and returned.
    #[instrument(skip_all, fields(mode = config.render_mode.as_deref().unwrap_or("")))]
    pub async fn initialize_mapper(&self, source: &str, config: &MapperConfig) -> Result<MapperService> {
        match self.run(source, config).await {
            Ok(service) => Ok(service),
            Err(e) => {
                error!(error = %e, "Page mapper initialization failed");
                Err(e)
            }
        }
    }

    async fn run(&self, source: &str, config: &MapperConfig) -> Result<MapperService> {
        let total_start = Instant::now();

        let strategy = self.registry.resolve(config.render_mode.as_deref())?;
        config.validate()?;

        let started = Instant::now();
        let embed = embed_source_markers(source, config)?;
        let embedding = started.elapsed();

        let started = Instant::now();
        let rendered_html = strategy.render(&embed.marked_html, &config.render_options).await?;
        let rendering = started.elapsed();

        let rendered_doc = Document::parse(&rendered_html);

        let started = Instant::now();
        let outcome = build_mapping(&rendered_doc, &embed.source_doc, &embed.source_paths, config)?;
        let mapping = started.elapsed();

        let metrics = PerformanceMetrics {
            embedding,
            rendering,
            mapping,
            total: total_start.elapsed(),
            element_mapping_count: outcome.mapping.len(),
        };
        if config.log_performance {
            metrics.log();
        }

        MapperService::from_parts(ServiceParts {
            config: config.clone(),
            embed,
            rendered_html,
            rendered_doc,
            outcome,
            metrics,
        })
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(RendererRegistry::with_defaults())
    }
}

/// Map `source` with the default strategies
pub async fn initialize_mapper(source: &str, config: &MapperConfig) -> Result<MapperService> {
    Orchestrator::default().initialize_mapper(source, config).await
}
