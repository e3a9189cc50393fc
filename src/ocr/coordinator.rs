//! Two-stage extraction coordination: vision model first, local OCR fallback.
//!
//! One invocation per document, strictly ordered, no parallelism, no
//! retries, no caching. The vision stage is attempted only when the
//! engine is configured; any vision error or empty response is swallowed
//! and triggers the fallback. Local-engine errors propagate, and an empty
//! result after both stages is the single fatal condition.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ExtractionMethod, ExtractionResult, LineDetail, TextLine};

use super::engine::{Detection, EngineError, LocalEngine, OcrFlags, VisionEngine};
use super::sanitize::sanitize_value;

/// Confidence assigned to every vision-model line and to the overall
/// vision result; the model reports no real per-line scores.
pub const VISION_LINE_CONFIDENCE: f64 = 0.95;

/// Errors surfaced by the coordinator.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Neither engine produced usable text; fatal for the request.
    #[error("Both extraction engines failed: {0}")]
    BothEnginesFailed(String),

    /// The local engine itself errored (there is no third fallback).
    #[error("Local OCR engine failed: {0}")]
    LocalEngine(#[source] EngineError),
}

/// Outcome of the vision stage. Distinguishes "not attempted" from
/// "attempted and failed" so the fallback reason is explicit rather than
/// inferred from empty output.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage produced a usable result.
    Extracted(ExtractionResult),
    /// The stage was attempted and failed; reason is logged, not surfaced.
    Failed(String),
    /// The stage could not be attempted (engine not configured).
    Skipped(String),
}

/// Coordinates the two extraction engines for one document at a time.
pub struct ExtractionCoordinator {
    vision: Option<Arc<dyn VisionEngine>>,
    local: Arc<dyn LocalEngine>,
}

impl ExtractionCoordinator {
    pub fn new(vision: Option<Arc<dyn VisionEngine>>, local: Arc<dyn LocalEngine>) -> Self {
        Self { vision, local }
    }

    /// Whether the vision stage will be attempted at all.
    pub fn vision_configured(&self) -> bool {
        self.vision
            .as_ref()
            .map(|engine| engine.is_available())
            .unwrap_or(false)
    }

    /// Whether the local engine reports itself runnable.
    pub fn local_available(&self) -> bool {
        self.local.is_available()
    }

    /// Extract text from the file at `path`, trying the vision model
    /// first and the local engine on any vision failure. Fails only when
    /// both engines fail.
    pub async fn extract(
        &self,
        path: &Path,
        flags: OcrFlags,
    ) -> Result<ExtractionResult, ExtractError> {
        let vision_note = match self.try_vision(path).await {
            StageOutcome::Extracted(result) => {
                info!(lines = result.lines.len(), "vision model extraction succeeded");
                return Ok(result);
            }
            StageOutcome::Failed(reason) => format!("vision model failed ({reason})"),
            StageOutcome::Skipped(reason) => format!("vision model skipped ({reason})"),
        };

        let detections = self
            .local
            .detect(path, flags)
            .await
            .map_err(ExtractError::LocalEngine)?;
        let result = result_from_detections(detections);

        if result.text.is_empty() {
            return Err(ExtractError::BothEnginesFailed(format!(
                "{vision_note}; local OCR produced no text"
            )));
        }

        info!(
            lines = result.lines.len(),
            confidence = ?result.confidence,
            "local OCR extraction succeeded"
        );
        Ok(result)
    }

    /// Attempt the vision stage. Errors and empty responses are both
    /// stage failures here, never surfaced to the caller.
    async fn try_vision(&self, path: &Path) -> StageOutcome {
        let Some(engine) = &self.vision else {
            return StageOutcome::Skipped("no vision credentials configured".to_string());
        };
        if !engine.is_available() {
            return StageOutcome::Skipped(engine.availability_hint());
        }

        match engine.extract_text(path).await {
            Ok(text) if !text.trim().is_empty() => {
                StageOutcome::Extracted(result_from_vision_text(&text))
            }
            Ok(_) => {
                warn!("vision model returned empty text, falling back to local OCR");
                StageOutcome::Failed("empty response".to_string())
            }
            Err(e) => {
                warn!(error = %e, "vision model failed, falling back to local OCR");
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Build a normalized result from the vision model's plain text: one line
/// per non-empty line of output, 1-based indexes, constant confidence.
fn result_from_vision_text(text: &str) -> ExtractionResult {
    let lines: Vec<TextLine> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| TextLine {
            text: line.to_string(),
            confidence: Some(VISION_LINE_CONFIDENCE),
            detail: LineDetail::LineIndex(i as u32 + 1),
        })
        .collect();

    ExtractionResult {
        text: text.to_string(),
        confidence: Some(VISION_LINE_CONFIDENCE),
        lines,
        method: ExtractionMethod::Vision,
    }
}

/// Build a normalized result from local-engine detections: one line per
/// non-empty detection in engine order, overall confidence as the mean of
/// the confidences present (absent, not zero, when none reported one).
/// All engine-originated numerics are sanitized before leaving this
/// boundary.
fn result_from_detections(detections: Vec<Detection>) -> ExtractionResult {
    let mut text = String::new();
    let mut confidences: Vec<f64> = Vec::new();
    let mut lines: Vec<TextLine> = Vec::new();

    for detection in detections {
        if detection.text.is_empty() {
            continue;
        }

        text.push_str(&detection.text);
        text.push('\n');

        if let Some(confidence) = detection.confidence {
            confidences.push(confidence);
        }

        let detail = match detection.polygon {
            Some(polygon) => LineDetail::Geometry(sanitize_value(polygon)),
            None => LineDetail::Bare,
        };
        lines.push(TextLine {
            text: detection.text,
            confidence: detection.confidence,
            detail,
        });
    }

    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    ExtractionResult {
        text,
        confidence,
        lines,
        method: ExtractionMethod::LocalOcr,
    }
}
