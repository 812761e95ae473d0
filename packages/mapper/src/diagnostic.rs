use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Warning,
    Info,
}

/// What went missing during a mapping run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    MissingSourceRoot,
    MissingRenderedRoot,
    EmptySourceMap,
    UnmatchedMarker,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingSourceRoot => "missing-source-root",
            Self::MissingRenderedRoot => "missing-rendered-root",
            Self::EmptySourceMap => "empty-source-map",
            Self::UnmatchedMarker => "unmatched-marker",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem found while building a mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub kind: DiagnosticKind,
    pub message: String,

    /// Marker the diagnostic is about, if any
    pub marker: Option<String>,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            kind,
            message: message.into(),
            marker: None,
        }
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            kind,
            message: message.into(),
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Emit through `tracing` at the matching level
    pub fn emit(&self) {
        match self.level {
            DiagnosticLevel::Warning => warn!(
                kind = %self.kind,
                marker = self.marker.as_deref().unwrap_or(""),
                "{}",
                self.message
            ),
            DiagnosticLevel::Info => info!(
                kind = %self.kind,
                marker = self.marker.as_deref().unwrap_or(""),
                "{}",
                self.message
            ),
        }
    }
}
