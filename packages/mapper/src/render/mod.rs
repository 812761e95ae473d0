//! Render strategies
//!
//! A render strategy turns marked markup into the final page markup. The
//! mapper treats it as a black box: anything may happen to the tree as long
//! as the markers ride along.

mod decorator;
mod page;
mod server;
mod wait;

pub use decorator::{decorator_fn, Decorator, DecoratorRenderer, DecoratorResult};
pub use page::{splice_document, PageRenderer};
pub use server::{start_disposable_server, DisposableServer, DocumentServer};
pub use wait::{
    apply_wait_condition, event_tracker_script, PageContext, WaitCondition, WaitOutcome, DEFAULT_TIMEOUT,
    POLL_INTERVAL,
};

use crate::config::RenderOptions;
use crate::error::{MapperError, RenderResult, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const PAGE_MODE: &str = "page";
pub const DECORATORS_MODE: &str = "decorators";

/// Mode names older page-mapper configs use
pub const LEGACY_ALIASES: &[(&str, &str)] = &[("iframe", PAGE_MODE), ("renderers", DECORATORS_MODE)];

/// Pluggable render pipeline
#[async_trait]
pub trait RenderAdapter: Send + Sync {
    async fn render(&self, marked_html: &str, options: &RenderOptions) -> RenderResult<String>;
}

pub enum RenderStrategy {
    /// Reference page loaded in headless Chrome
    Page(PageRenderer),
    /// In-process decorator chain
    Decorators(DecoratorRenderer),
    Custom(Arc<dyn RenderAdapter>),
}

impl RenderStrategy {
    pub async fn render(&self, marked_html: &str, options: &RenderOptions) -> RenderResult<String> {
        match self {
            Self::Page(renderer) => renderer.render(marked_html, options).await,
            Self::Decorators(renderer) => renderer.render(marked_html, options).await,
            Self::Custom(adapter) => adapter.render(marked_html, options).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Page(_) => "page",
            Self::Decorators(_) => "decorators",
            Self::Custom(_) => "custom",
        }
    }

    pub fn custom(adapter: impl RenderAdapter + 'static) -> Self {
        Self::Custom(Arc::new(adapter))
    }
}

impl fmt::Debug for RenderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(renderer) => f.debug_tuple("Page").field(renderer).finish(),
            Self::Decorators(renderer) => f.debug_tuple("Decorators").field(renderer).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Named render strategies available to the orchestrator
#[derive(Debug)]
pub struct RendererRegistry {
    strategies: BTreeMap<String, RenderStrategy>,
    /// Alternative name to registered name
    aliases: BTreeMap<String, String>,
}

impl RendererRegistry {
    /// Registry with no strategies
    pub fn new() -> Self {
        Self {
            strategies: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// `page` and an empty `decorators` chain, also reachable as `iframe`
    /// and `renderers`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new()
            .with(PAGE_MODE, RenderStrategy::Page(PageRenderer::new()))
            .with(DECORATORS_MODE, RenderStrategy::Decorators(DecoratorRenderer::new()));
        for (alias, target) in LEGACY_ALIASES {
            registry.alias(*alias, *target);
        }
        registry
    }

    /// Register `strategy` under `name`, returning any strategy it replaces
    pub fn register(&mut self, name: impl Into<String>, strategy: RenderStrategy) -> Option<RenderStrategy> {
        self.strategies.insert(name.into(), strategy)
    }

    pub fn with(mut self, name: impl Into<String>, strategy: RenderStrategy) -> Self {
        self.register(name, strategy);
        self
    }

    /// Make `alias` resolve to whatever is registered under `target`.
    /// A strategy registered under `alias` itself takes precedence.
    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    pub fn get(&self, name: &str) -> Option<&RenderStrategy> {
        self.strategies.get(name).or_else(|| {
            self.aliases
                .get(name)
                .and_then(|target| self.strategies.get(target))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Look up a configured render mode
    pub fn resolve(&self, mode: Option<&str>) -> Result<&RenderStrategy> {
        let available = self.names().join(", ");
        let mode = mode
            .filter(|m| !m.is_empty())
            .ok_or_else(|| MapperError::MissingRenderMode {
                available: available.clone(),
            })?;
        self.get(mode).ok_or_else(|| MapperError::UnknownRenderMode {
            mode: mode.to_string(),
            available,
        })
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
