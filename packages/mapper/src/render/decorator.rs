//! In-process rendering through an ordered chain of decorators

use crate::config::RenderOptions;
use crate::error::{RenderError, RenderResult};
use async_trait::async_trait;
use pagemap_dom::{Document, NodeId, Selector};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};

pub type DecoratorResult = anyhow::Result<()>;

/// One step of a decoration pipeline. Receives the whole document and the
/// located root and may restructure both freely.
#[async_trait]
pub trait Decorator: Send + Sync {
    async fn decorate(&self, doc: &mut Document, root: NodeId) -> DecoratorResult;
}

#[async_trait]
impl<F> Decorator for F
where
    F: Fn(&mut Document, NodeId) -> DecoratorResult + Send + Sync,
{
    async fn decorate(&self, doc: &mut Document, root: NodeId) -> DecoratorResult {
        self(doc, root)
    }
}

/// Pin down closure signatures for use as a [`Decorator`]
pub fn decorator_fn<F>(f: F) -> F
where
    F: Fn(&mut Document, NodeId) -> DecoratorResult + Send + Sync,
{
    f
}

#[derive(Clone, Default)]
pub struct DecoratorRenderer {
    decorators: Vec<Arc<dyn Decorator>>,
}

impl DecoratorRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, decorator: impl Decorator + 'static) -> Self {
        self.push(decorator);
        self
    }

    pub fn push(&mut self, decorator: impl Decorator + 'static) {
        self.decorators.push(Arc::new(decorator));
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }

    /// Run every decorator in order, each awaited before the next. The first
    /// failure aborts the chain.
    #[instrument(skip_all, fields(decorators = self.decorators.len()))]
    pub async fn render(&self, marked_html: &str, options: &RenderOptions) -> RenderResult<String> {
        let selector = Selector::parse(&options.root_selector)?;
        let mut doc = Document::parse(marked_html);
        let root = doc
            .select_first(doc.root(), &selector)
            .ok_or_else(|| RenderError::root_not_found(&options.root_selector, "marked markup"))?;

        for (index, decorator) in self.decorators.iter().enumerate() {
            if let Err(e) = decorator.decorate(&mut doc, root).await {
                error!(index, error = %e, "Decorator failed");
                return Err(RenderError::Decorator {
                    index,
                    message: e.to_string(),
                });
            }
            debug!(index, "Decorator finished");
        }

        Ok(doc.to_html())
    }
}

impl fmt::Debug for DecoratorRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorRenderer")
            .field("decorators", &self.decorators.len())
            .finish()
    }
}
