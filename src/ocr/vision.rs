//! Google Gemini Vision client - the primary extraction engine.
//!
//! Uses Gemini's generateContent API for LLM-based text extraction.
//! Configured solely by the presence of an API key; without one the
//! coordinator skips this stage entirely. PDFs are rasterized to PNG
//! pages first and extracted page by page.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::debug;

use super::engine::{EngineError, VisionEngine};
use super::pdf;

/// Fixed instruction prompt: verbatim extraction, line breaks preserved.
const EXTRACTION_PROMPT: &str = "Extract all text from this image exactly as written. \
    Preserve the original line breaks and reading order. \
    Return only the extracted text with no explanations or commentary.";

/// Request timeout for a single model call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini Vision engine using Google's Generative AI API.
pub struct GeminiVision {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiApiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: String,
}

impl GeminiVision {
    /// Create a new engine. `api_key = None` means the engine is present
    /// but unavailable and the coordinator will skip it.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            api_key,
            model: model.into(),
            client,
        }
    }

    /// Run one model call on a single image file.
    async fn run_gemini(&self, image_path: &Path) -> Result<String, EngineError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EngineError::NotAvailable(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let image_bytes = tokio::fs::read(image_path).await?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image_bytes);
        let mime_type = mime_guess::from_path(image_path)
            .first_or_octet_stream()
            .to_string();

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type,
                            data: image_base64,
                        },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.1,
                max_output_tokens: 8192,
            },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, api_key
        );

        debug!(model = %self.model, "calling vision model");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Failed(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Failed(format!(
                "Gemini API error ({}): {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Failed(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = gemini_response.error {
            return Err(EngineError::Failed(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text = gemini_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        Ok(text)
    }
}

#[async_trait]
impl VisionEngine for GeminiVision {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string()
        } else {
            format!("Gemini Vision is available (model: {})", self.model)
        }
    }

    async fn extract_text(&self, path: &Path) -> Result<String, EngineError> {
        if !pdf::is_pdf(path) {
            return self.run_gemini(path).await;
        }

        // Rasterize and extract each page in order
        let temp_dir = TempDir::new()?;
        let pdf_path = path.to_path_buf();
        let out_dir = temp_dir.path().to_path_buf();
        let images = tokio::task::spawn_blocking(move || pdf::pdf_to_images(&pdf_path, &out_dir))
            .await
            .map_err(|e| EngineError::Failed(format!("rasterize task failed: {}", e)))??;

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            pages.push(self.run_gemini(image).await?);
        }
        Ok(pages.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_without_key() {
        let engine = GeminiVision::new(None, "gemini-1.5-flash");
        assert!(!engine.is_available());
        assert!(engine.availability_hint().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_available_with_key() {
        let engine = GeminiVision::new(Some("key".to_string()), "gemini-1.5-flash");
        assert!(engine.is_available());
        assert!(engine.availability_hint().contains("gemini-1.5-flash"));
    }

    #[tokio::test]
    async fn test_extract_without_key_is_not_available_error() {
        let engine = GeminiVision::new(None, "gemini-1.5-flash");
        let err = engine
            .extract_text(Path::new("/nonexistent.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAvailable(_)));
    }
}
