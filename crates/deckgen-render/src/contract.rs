use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deckgen_core::SlideDescriptor;

/// Generator tag baked into rendered file names (`report.pg.pptx`).
pub const GENERATOR_TAG: &str = "pg";

/// One render call: the finished deck plus where to write it. The slide list
/// is opaque to this layer — the renderer never reshapes it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderRequest {
    pub slides: Vec<SlideDescriptor>,
    pub output_path: PathBuf,
    pub title: String,
    pub author: String,
}

impl RenderRequest {
    pub fn new(slides: Vec<SlideDescriptor>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            slides,
            output_path: output_path.into(),
            title: "deckgen report".into(),
            author: "deckgen".into(),
        }
    }

    /// Parameters in the shape the pptx script expects on stdin. The slide
    /// list travels as a pre-serialized string under `slidesJSON`; the layout
    /// is fixed 16x9.
    pub fn to_script_params(&self) -> Result<serde_json::Value, serde_json::Error> {
        let slides_json = serde_json::to_string(&self.slides)?;
        Ok(serde_json::json!({
            "action": "save",
            "path": self.output_path.display().to_string(),
            "title": self.title,
            "author": self.author,
            "layout": "LAYOUT_16x9",
            "slidesJSON": slides_json,
        }))
    }
}

/// What the renderer process reports back on stdout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderReply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("node binary not found; searched {searched:?}")]
    NodeNotFound { searched: Vec<String> },

    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    #[error("render cancelled")]
    Cancelled,

    /// Renderer exited non-zero or reported failure; diagnostics verbatim.
    #[error("render failed: {diagnostics}")]
    Failed { diagnostics: String },

    #[error("unintelligible renderer reply: {0}")]
    InvalidReply(String),

    #[error("io error: {0}")]
    Io(String),
}

impl RenderError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NodeNotFound { .. } => "node_not_found",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Failed { .. } => "failed",
            Self::InvalidReply(_) => "invalid_reply",
            Self::Io(_) => "io",
        }
    }
}

/// The external rendering seam. Production uses the Node subprocess; tests
/// swap in the mock.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckgen_core::{ReportMeta, SlideDescriptor};

    #[test]
    fn script_params_carry_slides_as_string() {
        let meta = ReportMeta::default();
        let request = RenderRequest::new(
            vec![SlideDescriptor::title_slide(&meta)],
            "/tmp/out/report.pg.pptx",
        );
        let params = request.to_script_params().unwrap();

        assert_eq!(params["action"], "save");
        assert_eq!(params["path"], "/tmp/out/report.pg.pptx");
        assert_eq!(params["layout"], "LAYOUT_16x9");

        // slidesJSON is a string containing the serialized slide list
        let inner: Vec<SlideDescriptor> =
            serde_json::from_str(params["slidesJSON"].as_str().unwrap()).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].title.as_deref(), Some("Good Hospital运营分析报告"));
    }

    #[test]
    fn reply_parses_with_missing_optionals() {
        let reply: RenderReply = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(reply.success);
        assert!(reply.error.is_none());

        let reply: RenderReply =
            serde_json::from_str(r#"{"success": false, "error": "bad chart"}"#).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("bad chart"));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            RenderError::Timeout(Duration::from_secs(30)).error_kind(),
            "timeout"
        );
        assert_eq!(
            RenderError::Failed {
                diagnostics: "x".into()
            }
            .error_kind(),
            "failed"
        );
    }
}
