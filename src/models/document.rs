//! Document and extraction result models.
//!
//! Whichever engine produced a result, the outward-facing record has the
//! same field set, with absent fields serialized as JSON null. Per-line
//! placement differs by engine and is modeled as a tagged union that
//! flattens into a uniform wire schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which engine produced an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    /// Cloud vision-language model (primary).
    Vision,
    /// Locally-run OCR engine (fallback).
    LocalOcr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::LocalOcr => "local-ocr",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-line placement detail, which differs by producing engine.
///
/// The local engine reports detection polygons; the vision path has no
/// geometry and synthesizes a 1-based line index instead.
#[derive(Debug, Clone, PartialEq)]
pub enum LineDetail {
    /// Detected region polygon: ordered sequence of 2D points.
    Geometry(Value),
    /// 1-based ordinal position within the extracted text.
    LineIndex(u32),
    /// Text without per-line placement.
    Bare,
}

/// One normalized unit of recognized text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Recognized text content.
    pub text: String,
    /// Per-line confidence (0.0 - 1.0), if the engine reported one.
    pub confidence: Option<f64>,
    /// Placement detail from the producing engine.
    pub detail: LineDetail,
}

/// Flat wire schema shared by both engines; absent fields are null.
#[derive(Serialize, Deserialize)]
struct TextLineWire {
    text: String,
    confidence: Option<f64>,
    polygon: Option<Value>,
    line_index: Option<u32>,
}

impl Serialize for TextLine {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (polygon, line_index) = match &self.detail {
            LineDetail::Geometry(points) => (Some(points.clone()), None),
            LineDetail::LineIndex(n) => (None, Some(*n)),
            LineDetail::Bare => (None, None),
        };
        TextLineWire {
            text: self.text.clone(),
            confidence: self.confidence,
            polygon,
            line_index,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TextLine {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = TextLineWire::deserialize(deserializer)?;
        let detail = match (wire.polygon, wire.line_index) {
            (Some(points), _) => LineDetail::Geometry(points),
            (None, Some(n)) => LineDetail::LineIndex(n),
            (None, None) => LineDetail::Bare,
        };
        Ok(TextLine {
            text: wire.text,
            confidence: wire.confidence,
            detail,
        })
    }
}

/// Result of extracting one document. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Full extracted text (possibly empty).
    pub text: String,
    /// Overall confidence (0.0 - 1.0), absent when no line reported one.
    pub confidence: Option<f64>,
    /// Recognized lines in engine order.
    pub lines: Vec<TextLine>,
    /// Which engine produced this result.
    pub method: ExtractionMethod,
}

/// Metadata for one incoming upload. Exists for the duration of a single
/// request and is never mutated after creation.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Opaque unique token for this upload.
    pub id: String,
    /// Original filename as sent by the client.
    pub filename: String,
    /// Lower-cased extension including the leading dot (e.g. ".pdf").
    pub file_type: String,
    /// Upload size in bytes.
    pub file_size: u64,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, file_type: impl Into<String>, file_size: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            file_type: file_type.into(),
            file_size,
        }
    }
}

/// Write-once row sent to the external store after successful extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub extracted_text: String,
    pub confidence: Option<f64>,
    pub file_type: String,
    pub file_size: u64,
    pub extraction_method: String,
    /// Creation timestamp, ISO-8601 UTC.
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(document: &UploadedDocument, result: &ExtractionResult) -> Self {
        Self {
            id: document.id.clone(),
            filename: document.filename.clone(),
            extracted_text: result.text.trim().to_string(),
            confidence: result.confidence,
            file_type: document.file_type.clone(),
            file_size: document.file_size,
            extraction_method: result.method.as_str().to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Raw upload stored without OCR: metadata plus base64-encoded content.
#[derive(Debug, Clone, Serialize)]
pub struct RawDocumentRecord {
    pub id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub content_base64: String,
    pub created_at: DateTime<Utc>,
}

impl RawDocumentRecord {
    pub fn new(document: &UploadedDocument, content: &[u8]) -> Self {
        use base64::Engine;

        Self {
            id: document.id.clone(),
            filename: document.filename.clone(),
            file_type: document.file_type.clone(),
            file_size: document.file_size,
            content_base64: base64::engine::general_purpose::STANDARD.encode(content),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_line_serializes_absent_fields_as_null() {
        let line = TextLine {
            text: "hello".to_string(),
            confidence: Some(0.9),
            detail: LineDetail::LineIndex(3),
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(
            value,
            json!({"text": "hello", "confidence": 0.9, "polygon": null, "line_index": 3})
        );

        let line = TextLine {
            text: "world".to_string(),
            confidence: None,
            detail: LineDetail::Geometry(json!([[0, 0], [10, 0], [10, 5], [0, 5]])),
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["confidence"], json!(null));
        assert_eq!(value["line_index"], json!(null));
        assert_eq!(value["polygon"][2], json!([10, 5]));
    }

    #[test]
    fn test_text_line_round_trips() {
        let line = TextLine {
            text: "x".to_string(),
            confidence: None,
            detail: LineDetail::Bare,
        };
        let back: TextLine = serde_json::from_value(serde_json::to_value(&line).unwrap()).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_extraction_method_tags() {
        assert_eq!(ExtractionMethod::Vision.as_str(), "vision");
        assert_eq!(ExtractionMethod::LocalOcr.as_str(), "local-ocr");
        assert_eq!(
            serde_json::to_value(ExtractionMethod::LocalOcr).unwrap(),
            json!("local-ocr")
        );
    }

    #[test]
    fn test_record_trims_extracted_text() {
        let document = UploadedDocument::new("scan.png", ".png", 42);
        let result = ExtractionResult {
            text: "line one\nline two\n".to_string(),
            confidence: Some(0.8),
            lines: vec![],
            method: ExtractionMethod::LocalOcr,
        };
        let record = DocumentRecord::new(&document, &result);
        assert_eq!(record.extracted_text, "line one\nline two");
        assert_eq!(record.extraction_method, "local-ocr");
        assert_eq!(record.file_size, 42);
    }

    #[test]
    fn test_raw_record_encodes_content() {
        let document = UploadedDocument::new("notes.txt", ".txt", 5);
        let record = RawDocumentRecord::new(&document, b"hello");
        assert_eq!(record.content_base64, "aGVsbG8=");
    }
}
