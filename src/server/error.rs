//! Error mapping from processing failures to HTTP responses.
//!
//! Stage-1 (vision) failures never reach this module; the coordinator
//! swallows them as fallback triggers. Everything here is terminal for
//! the file it concerns, and carries a message naming the failed stage so
//! callers can tell "we could not read your document" apart from "we read
//! it but could not save it".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::ocr::ExtractError;
use crate::store::StoreError;

/// Errors terminal for one processed file.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Extension not in the allow-list; rejected before any engine call.
    #[error("File type {extension} not supported. Allowed types: {allowed}")]
    UnsupportedFileType { extension: String, allowed: String },

    /// Upload larger than the configured limit.
    #[error("File too large: {size} bytes (maximum {max})")]
    TooLarge { size: usize, max: usize },

    /// Malformed multipart payload or no file present.
    #[error("Upload error: {0}")]
    Upload(String),

    /// Extraction failed after both stages.
    #[error("Error processing document: {0}")]
    Extraction(#[from] ExtractError),

    /// The store rejected the write after successful extraction.
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedFileType { .. } | Self::Upload(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Extraction(_) | Self::Store(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = ProcessError::UnsupportedFileType {
            extension: ".exe".to_string(),
            allowed: ".png, .pdf".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ProcessError::TooLarge { size: 11, max: 10 };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let err = ProcessError::Extraction(ExtractError::BothEnginesFailed("x".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ProcessError::Store(crate::store::StoreError::Rejected {
            status: 401,
            body: "bad key".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Database error"));
    }
}
