use pagemap_dom::SelectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("renderMode is required. Available: {available}")]
    MissingRenderMode { available: String },

    #[error("Unknown renderMode \"{mode}\". Available: {available}")]
    UnknownRenderMode { mode: String, available: String },

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MapperError>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("url is required for page rendering")]
    MissingUrl,

    #[error("Failed to fetch {url}: {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Root element {selector} not found in {location}")]
    RootNotFound { selector: String, location: String },

    #[error("Timeout waiting for event: {name} ({timeout_ms}ms)")]
    EventTimeout { name: String, timeout_ms: u64 },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Decorator {index} failed: {message}")]
    Decorator { index: usize, message: String },

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render task failed: {0}")]
    Task(String),
}

impl RenderError {
    pub fn root_not_found(selector: &str, location: impl Into<String>) -> Self {
        Self::RootNotFound {
            selector: selector.to_string(),
            location: location.into(),
        }
    }

    pub fn browser(e: impl std::fmt::Display) -> Self {
        Self::Browser(e.to_string())
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
