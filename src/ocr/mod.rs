//! Text extraction engines and the two-stage coordination policy.
//!
//! Extraction runs through two independent backends:
//! - Gemini Vision for LLM-based text extraction (primary, needs an API key)
//! - Tesseract OCR via command-line for local extraction (fallback, default)
//! - PaddleOCR via ONNX as an alternative local engine (feature: ocr-paddle)
//!
//! The coordinator tries the vision model first and falls back to the local
//! engine when the model is absent, errors, or yields no usable text. Both
//! outputs are normalized into one record shape before leaving this module.

mod coordinator;
mod engine;
mod local;
mod model_utils;
mod pdf;
mod sanitize;
mod vision;

#[cfg(feature = "ocr-paddle")]
mod paddle;

pub use coordinator::{ExtractError, ExtractionCoordinator, StageOutcome, VISION_LINE_CONFIDENCE};
pub use engine::{Detection, EngineError, LocalEngine, OcrFlags, VisionEngine};
pub use local::TesseractEngine;
pub use model_utils::check_binary;
pub use sanitize::{sanitize_value, unwrap_scalar};
pub use vision::GeminiVision;

#[cfg(feature = "ocr-paddle")]
pub use paddle::PaddleEngine;
