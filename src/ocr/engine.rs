//! Engine abstraction shared by the two extraction stages.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors from extraction engines.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine not available: {0}")]
    NotAvailable(String),

    #[error("Extraction failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Optional preprocessing toggles for the local engine.
///
/// Inert on the vision path; the vision model receives the document as-is.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OcrFlags {
    /// Classify and correct whole-document orientation.
    #[serde(default)]
    pub use_doc_orientation_classify: bool,
    /// Unwarp curved or skewed documents before detection.
    #[serde(default)]
    pub use_doc_unwarping: bool,
    /// Correct per-line text orientation.
    #[serde(default)]
    pub use_textline_orientation: bool,
}

/// One detected text region from the local engine, in engine order.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Recognized text (may be empty for regions with no legible text).
    pub text: String,
    /// Recognition confidence (0.0 - 1.0), if the engine reported one.
    pub confidence: Option<f64>,
    /// Raw detection polygon as reported by the engine. Numeric types are
    /// not yet normalized; the coordinator sanitizes them.
    pub polygon: Option<Value>,
}

/// Cloud vision-language model used as the first extraction attempt.
#[async_trait]
pub trait VisionEngine: Send + Sync {
    /// Whether the engine can be invoked (credentials present).
    fn is_available(&self) -> bool;

    /// Description of what is needed to make this engine available.
    fn availability_hint(&self) -> String;

    /// Extract verbatim text from the file, line breaks preserved.
    async fn extract_text(&self, path: &Path) -> Result<String, EngineError>;
}

/// Locally-run OCR engine used when the vision model is absent or fails.
#[async_trait]
pub trait LocalEngine: Send + Sync {
    /// Whether the engine can be invoked (binary/models present).
    fn is_available(&self) -> bool;

    /// Description of what is needed to make this engine available.
    fn availability_hint(&self) -> String;

    /// Detect text regions in the file, in reading order.
    async fn detect(&self, path: &Path, flags: OcrFlags)
        -> Result<Vec<Detection>, EngineError>;
}
