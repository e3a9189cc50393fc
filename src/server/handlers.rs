//! HTTP handlers for the OCR and upload endpoints.

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::models::{
    DocumentRecord, ExtractionMethod, RawDocumentRecord, TextLine, UploadedDocument,
};
use crate::ocr::OcrFlags;

use super::error::ProcessError;
use super::AppState;

/// Extensions accepted by the OCR endpoints.
pub const OCR_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".pdf", ".bmp", ".tiff"];

/// Wider allow-list for the raw-upload endpoint (documents/spreadsheets).
pub const RAW_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".pdf", ".bmp", ".tiff", ".doc", ".docx", ".xls", ".xlsx", ".ppt",
    ".pptx", ".txt", ".csv",
];

/// Envelope shared by the single-document endpoints.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<OcrPayload>,
}

/// One processed document as returned to the client.
#[derive(Debug, Serialize)]
pub struct OcrPayload {
    pub document_id: String,
    pub filename: String,
    pub extracted_text: String,
    pub confidence: Option<f64>,
    pub text_lines: Vec<TextLine>,
    pub extraction_method: ExtractionMethod,
    pub created_at: DateTime<Utc>,
}

/// Batch upload summary: per-file results and per-file errors.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<OcrPayload>,
    pub errors: Vec<BatchError>,
}

#[derive(Debug, Serialize)]
pub struct BatchError {
    pub filename: String,
    pub error: String,
}

/// Raw upload response data (no OCR performed).
#[derive(Debug, Serialize)]
pub struct RawUploadResponse {
    pub success: bool,
    pub message: String,
    pub data: RawUploadData,
}

#[derive(Debug, Serialize)]
pub struct RawUploadData {
    pub document_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

/// `POST /ocr` - extract text from a single uploaded document.
pub async fn ocr_document(
    State(state): State<AppState>,
    Query(flags): Query<OcrFlags>,
    mut multipart: Multipart,
) -> Result<Json<DocumentResponse>, ProcessError> {
    let (filename, content) = read_one_file(&mut multipart).await?;
    let payload = process_file(&state, &filename, &content, flags).await?;

    Ok(Json(DocumentResponse {
        success: true,
        message: "Document processed successfully".to_string(),
        data: Some(payload),
    }))
}

/// `POST /upload` - extract text from several documents, strictly
/// sequentially. One file's failure is recorded and never aborts the
/// rest of the batch.
pub async fn upload_documents(
    State(state): State<AppState>,
    Query(flags): Query<OcrFlags>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, ProcessError> {
    let files = read_all_files(&mut multipart).await?;
    if files.is_empty() {
        return Err(ProcessError::Upload("no files provided".to_string()));
    }

    let total = files.len();
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for (filename, content) in files {
        match process_file(&state, &filename, &content, flags).await {
            Ok(payload) => results.push(payload),
            Err(e) => {
                warn!(filename = %filename, error = %e, "batch file failed");
                errors.push(BatchError {
                    filename,
                    error: e.to_string(),
                });
            }
        }
    }

    let processed = results.len();
    let failed = errors.len();
    Ok(Json(BatchResponse {
        success: failed == 0,
        message: format!("Processed {processed} of {total} documents"),
        processed,
        failed,
        results,
        errors,
    }))
}

/// `POST /upload-doc` - store a single raw file without OCR.
pub async fn upload_raw_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RawUploadResponse>, ProcessError> {
    let (filename, content) = read_one_file(&mut multipart).await?;
    let file_type = check_extension(&filename, RAW_EXTENSIONS)?;
    check_size(content.len(), state.max_file_size)?;

    let document = UploadedDocument::new(&filename, file_type, content.len() as u64);
    let record = RawDocumentRecord::new(&document, &content);

    match &state.store {
        Some(store) => store.insert_raw(&record).await?,
        None => warn!("document store not configured - upload not persisted"),
    }

    info!(document_id = %document.id, filename = %document.filename, "stored raw upload");

    Ok(Json(RawUploadResponse {
        success: true,
        message: "Document uploaded successfully".to_string(),
        data: RawUploadData {
            document_id: document.id,
            filename: document.filename,
            file_type: document.file_type,
            file_size: document.file_size,
            created_at: record.created_at,
        },
    }))
}

/// `GET /health` - engine and store availability report.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "vision_configured": state.coordinator.vision_configured(),
        "local_engine_available": state.coordinator.local_available(),
        "store_configured": state.store.is_some(),
    }))
}

/// Run one file through validation, extraction, and persistence.
///
/// The uploaded bytes live in a named temp file only for the duration of
/// this call; the file is removed on every exit path when the guard
/// drops.
async fn process_file(
    state: &AppState,
    filename: &str,
    content: &Bytes,
    flags: OcrFlags,
) -> Result<OcrPayload, ProcessError> {
    let file_type = check_extension(filename, OCR_EXTENSIONS)?;
    check_size(content.len(), state.max_file_size)?;
    let document = UploadedDocument::new(filename, file_type, content.len() as u64);

    let temp_file = tempfile::Builder::new()
        .prefix("ocrelay-")
        .suffix(&document.file_type)
        .tempfile()?;
    tokio::fs::write(temp_file.path(), content).await?;

    info!(document_id = %document.id, filename = %document.filename, "processing document");

    let result = state.coordinator.extract(temp_file.path(), flags).await?;
    let record = DocumentRecord::new(&document, &result);

    match &state.store {
        Some(store) => store.insert_document(&record).await?,
        None => warn!("document store not configured - result not persisted"),
    }

    Ok(OcrPayload {
        document_id: document.id,
        filename: document.filename,
        extracted_text: record.extracted_text,
        confidence: result.confidence,
        text_lines: result.lines,
        extraction_method: result.method,
        created_at: record.created_at,
    })
}

/// Lower-cased extension including the leading dot, empty when absent.
fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_lowercase())
        }
        _ => String::new(),
    }
}

/// Enforce the per-file size limit.
fn check_size(size: usize, max: usize) -> Result<(), ProcessError> {
    if size > max {
        Err(ProcessError::TooLarge { size, max })
    } else {
        Ok(())
    }
}

/// Validate the filename against an allow-list, returning the extension.
fn check_extension(filename: &str, allowed: &[&str]) -> Result<String, ProcessError> {
    let extension = file_extension(filename);
    if allowed.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ProcessError::UnsupportedFileType {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
            allowed: allowed.join(", "),
        })
    }
}

/// Read exactly one file field from the multipart payload. Size limits
/// are enforced per file downstream, not here.
async fn read_one_file(multipart: &mut Multipart) -> Result<(String, Bytes), ProcessError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProcessError::Upload(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field
            .bytes()
            .await
            .map_err(|e| ProcessError::Upload(e.to_string()))?;
        return Ok((filename, content));
    }

    Err(ProcessError::Upload("no file provided".to_string()))
}

/// Read every file field from the multipart payload, in order.
async fn read_all_files(multipart: &mut Multipart) -> Result<Vec<(String, Bytes)>, ProcessError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProcessError::Upload(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field
            .bytes()
            .await
            .map_err(|e| ProcessError::Upload(e.to_string()))?;
        files.push((filename, content));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("scan.PNG"), ".png");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("no_extension"), "");
        assert_eq!(file_extension(".hidden"), "");
        assert_eq!(file_extension("trailing."), "");
    }

    #[test]
    fn test_check_size() {
        assert!(check_size(10, 10).is_ok());
        let err = check_size(11, 10).unwrap_err();
        assert!(matches!(err, ProcessError::TooLarge { size: 11, max: 10 }));
    }

    #[test]
    fn test_check_extension() {
        assert_eq!(check_extension("a.pdf", OCR_EXTENSIONS).unwrap(), ".pdf");
        assert_eq!(check_extension("A.TIFF", OCR_EXTENSIONS).unwrap(), ".tiff");

        let err = check_extension("virus.exe", OCR_EXTENSIONS).unwrap_err();
        assert!(err.to_string().contains(".exe"));
        assert!(err.to_string().contains(".png"));

        // Spreadsheets are raw-upload only
        assert!(check_extension("sheet.xlsx", OCR_EXTENSIONS).is_err());
        assert!(check_extension("sheet.xlsx", RAW_EXTENSIONS).is_ok());
    }
}
