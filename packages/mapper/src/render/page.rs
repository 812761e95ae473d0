//! Full-page rendering in headless Chrome
//!
//! The reference page is fetched, its root content swapped for the marked
//! content, and the result loaded in a fresh browser so that the page's own
//! scripts decorate it exactly as they would in production.

use super::server::start_disposable_server;
use super::wait::{apply_wait_condition, event_tracker_script, PageContext, WaitCondition};
use crate::config::RenderOptions;
use crate::error::{RenderError, RenderResult};
use headless_chrome::{Browser, LaunchOptions, Tab};
use pagemap_dom::{Document, NodeId, Selector};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

const OUTER_HTML_SCRIPT: &str = "document.documentElement.outerHTML";

#[derive(Debug, Clone)]
pub struct PageRenderer {
    client: reqwest::Client,
    fetch_timeout: Option<Duration>,
    window_size: (u32, u32),
}

impl PageRenderer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            fetch_timeout: None,
            window_size: (1920, 1080),
        }
    }

    /// Bound the reference fetch. Unbounded by default.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width, height);
        self
    }

    #[instrument(skip_all, fields(url = options.url.as_deref().unwrap_or("")))]
    pub async fn render(&self, marked_html: &str, options: &RenderOptions) -> RenderResult<String> {
        let url = options.url.as_deref().ok_or(RenderError::MissingUrl)?;

        let page_html = self.fetch(url).await?;
        let document = splice_document(&page_html, marked_html, url, options)?;
        debug!(bytes = document.len(), "Spliced marked content into reference page");

        let wait_for = options.wait_for.clone();
        let window_size = self.window_size;
        let rendered = tokio::task::spawn_blocking(move || {
            run_browser_session(document, wait_for.as_ref(), window_size)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))??;

        info!(bytes = rendered.len(), "Captured rendered page");
        Ok(rendered)
    }

    async fn fetch(&self, url: &str) -> RenderResult<String> {
        let fetch_error = |e: reqwest::Error| RenderError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url);
        if let Some(timeout) = self.fetch_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(fetch_error)
    }
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Put the marked root content into the reference page and prepare its head:
/// a `<base>` pointing at `url`, the event tracker for an `event` wait
/// condition, and the caller's setup script, all ahead of the page's own
/// head content.
pub fn splice_document(
    page_html: &str,
    marked_html: &str,
    url: &str,
    options: &RenderOptions,
) -> RenderResult<String> {
    let selector = Selector::parse(&options.root_selector)?;
    let mut page = Document::parse(page_html);
    let marked = Document::parse(marked_html);

    let page_root = page
        .select_first(page.root(), &selector)
        .ok_or_else(|| RenderError::root_not_found(&options.root_selector, format!("page from {}", url)))?;
    let marked_root = marked
        .select_first(marked.root(), &selector)
        .ok_or_else(|| RenderError::root_not_found(&options.root_selector, "marked markup"))?;

    page.remove_children(page_root);
    for child in marked.children(marked_root).to_vec() {
        let copy = page.import_node(&marked, child);
        page.append_child(page_root, copy);
    }

    let mut injected = Vec::new();
    if page.first_element_by_name("base").is_none() {
        let base = page.create_element("base");
        page.set_attribute(base, "href", url);
        injected.push(base);
    }
    if let Some(WaitCondition::Event { name, .. }) = &options.wait_for {
        injected.push(create_script(&mut page, &event_tracker_script(name)));
    }
    if let Some(setup) = options.setup_script.as_deref().filter(|s| !s.trim().is_empty()) {
        injected.push(create_script(&mut page, setup));
    }

    if !injected.is_empty() {
        let head = ensure_head(&mut page);
        for (index, node) in injected.into_iter().enumerate() {
            page.insert_child(head, index, node);
        }
    }

    Ok(page.to_html())
}

fn create_script(doc: &mut Document, code: &str) -> NodeId {
    let script = doc.create_element("script");
    let text = doc.create_text(code);
    doc.append_child(script, text);
    script
}

fn ensure_head(doc: &mut Document) -> NodeId {
    if let Some(head) = doc.first_element_by_name("head") {
        return head;
    }
    let head = doc.create_element("head");
    match doc.first_element_by_name("html") {
        Some(html) => doc.prepend_child(html, head),
        None => {
            let root = doc.root();
            doc.prepend_child(root, head)
        }
    }
    head
}

/// Closes the tab on every exit path
struct TabGuard {
    tab: Arc<Tab>,
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            debug!(error = %e, "Failed to close render tab");
        }
    }
}

struct TabContext<'a>(&'a Tab);

impl PageContext for TabContext<'_> {
    fn evaluate(&self, expression: &str) -> RenderResult<Value> {
        let result = self.0.evaluate(expression, false).map_err(RenderError::browser)?;
        Ok(result.value.unwrap_or(Value::Null))
    }
}

/// Serve, load, wait, capture. Blocking; the browser process ends when
/// `browser` is dropped and the server thread when `server` is.
fn run_browser_session(
    document: String,
    wait_for: Option<&WaitCondition>,
    window_size: (u32, u32),
) -> RenderResult<String> {
    let server = start_disposable_server(document)?;

    let browser = Browser::new(LaunchOptions {
        headless: true,
        window_size: Some(window_size),
        ..Default::default()
    })
    .map_err(RenderError::browser)?;

    let guard = TabGuard {
        tab: browser.new_tab().map_err(RenderError::browser)?,
    };

    guard.tab.navigate_to(server.url()).map_err(RenderError::browser)?;
    guard.tab.wait_until_navigated().map_err(RenderError::browser)?;

    let outcome = apply_wait_condition(&TabContext(&guard.tab), wait_for)?;
    debug!(?outcome, "Page ready for capture");

    let html = guard
        .tab
        .evaluate(OUTER_HTML_SCRIPT, false)
        .map_err(RenderError::browser)?
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| RenderError::Browser("outerHTML did not return a string".to_string()))?;

    drop(guard);
    drop(browser);
    server.wait();

    Ok(html)
}
