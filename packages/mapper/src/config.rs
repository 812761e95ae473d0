use crate::error::{MapperError, Result};
use crate::render::WaitCondition;
use pagemap_dom::Selector;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "pagemap.config.json";

/// Mapper configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperConfig {
    /// Selector of the content root in both source and rendered documents
    #[serde(default = "default_root_selector")]
    pub root_selector: String,

    /// Elements under the root that receive markers
    #[serde(default = "default_target_selectors")]
    pub target_selectors: Vec<String>,

    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,

    /// Fixed marker id length. When unset each id is 6 or 8 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_id_length: Option<usize>,

    /// Registered render strategy to use (`page`, `decorators`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<String>,

    #[serde(default)]
    pub render_options: RenderOptions,

    #[serde(default = "default_true")]
    pub log_performance: bool,

    /// Source attributes copied back onto rendered elements by the annotator
    #[serde(default = "default_restore_attributes")]
    pub restore_attributes: Vec<String>,
}

/// Options handed to the render strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Reference page for the page strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_root_selector")]
    pub root_selector: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<WaitCondition>,

    /// Script run in the page before any of its own scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_script: Option<String>,
}

fn default_root_selector() -> String {
    "main".to_string()
}

fn default_target_selectors() -> Vec<String> {
    ["h1", "h2", "h3", "h4", "h5", "h6", "p", "img", "ul", "ol"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_marker_prefix() -> String {
    "MARKER_".to_string()
}

fn default_true() -> bool {
    true
}

fn default_restore_attributes() -> Vec<String> {
    ["data-cursor", "data-cursor-remote", "contenteditable"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl MapperConfig {
    /// Load config from a directory, falling back to defaults when the
    /// directory has no config file
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: MapperConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(MapperConfig::default())
        }
    }

    pub fn with_render_mode(mut self, mode: impl Into<String>) -> Self {
        self.render_mode = Some(mode.into());
        self
    }

    pub fn with_target_selectors<S: Into<String>>(mut self, selectors: impl IntoIterator<Item = S>) -> Self {
        self.target_selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    /// Reject settings that can never produce a usable marker
    pub fn validate(&self) -> Result<()> {
        if self.marker_prefix.is_empty() {
            return Err(MapperError::Config("markerPrefix must not be empty".to_string()));
        }
        if !self
            .marker_prefix
            .chars()
            .next()
            .map(|c| c.is_alphanumeric() || c == '_')
            .unwrap_or(false)
        {
            return Err(MapperError::Config(format!(
                "markerPrefix \"{}\" must start with a word character",
                self.marker_prefix
            )));
        }
        if self.marker_id_length == Some(0) {
            return Err(MapperError::Config("markerIdLength must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn root(&self) -> Result<Selector> {
        Ok(Selector::parse(&self.root_selector)?)
    }

    /// All target selectors as a single selector list
    pub fn targets(&self) -> Result<Selector> {
        Ok(Selector::parse_list(&self.target_selectors)?)
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            root_selector: default_root_selector(),
            target_selectors: default_target_selectors(),
            marker_prefix: default_marker_prefix(),
            marker_id_length: None,
            render_mode: None,
            render_options: RenderOptions::default(),
            log_performance: true,
            restore_attributes: default_restore_attributes(),
        }
    }
}

impl RenderOptions {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_wait_for(mut self, wait_for: WaitCondition) -> Self {
        self.wait_for = Some(wait_for);
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            url: None,
            root_selector: default_root_selector(),
            wait_for: None,
            setup_script: None,
        }
    }
}
