//! HTTP server wiring: shared state, router construction, and serving.

mod error;
mod handlers;
mod routes;

pub use error::ProcessError;
pub use handlers::{BatchResponse, DocumentResponse, OcrPayload, OCR_EXTENSIONS, RAW_EXTENSIONS};
pub use routes::create_router;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Settings;
use crate::ocr::{ExtractionCoordinator, GeminiVision};
use crate::store::{DocumentStore, SupabaseStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ExtractionCoordinator>,
    pub store: Option<Arc<dyn DocumentStore>>,
    pub max_file_size: usize,
    pub cors_origins: String,
}

impl AppState {
    /// Wire up real engines and the store from runtime settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let vision = settings.vision_api_key.as_ref().map(|key| {
            Arc::new(GeminiVision::new(
                Some(key.clone()),
                settings.vision_model.clone(),
            )) as Arc<dyn crate::ocr::VisionEngine>
        });

        #[cfg(feature = "ocr-paddle")]
        let local: Arc<dyn crate::ocr::LocalEngine> = Arc::new(crate::ocr::PaddleEngine::new());
        #[cfg(not(feature = "ocr-paddle"))]
        let local: Arc<dyn crate::ocr::LocalEngine> =
            Arc::new(crate::ocr::TesseractEngine::new(settings.ocr_lang.clone()));

        let store = match (&settings.supabase_url, &settings.supabase_key) {
            (Some(url), Some(key)) => {
                Some(Arc::new(SupabaseStore::new(url.clone(), key.clone()))
                    as Arc<dyn DocumentStore>)
            }
            _ => None,
        };

        Self {
            coordinator: Arc::new(ExtractionCoordinator::new(vision, local)),
            store,
            max_file_size: settings.max_file_size,
            cors_origins: settings.cors_origins.clone(),
        }
    }
}

/// Bind and serve the API until the process is stopped.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(settings);

    info!(
        vision = state.coordinator.vision_configured(),
        local = state.coordinator.local_available(),
        store = state.store.is_some(),
        "engine availability"
    );

    let app = create_router(state);
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::models::{DocumentRecord, RawDocumentRecord};
    use crate::ocr::{Detection, EngineError, LocalEngine, OcrFlags, VisionEngine};
    use crate::store::StoreError;

    const BOUNDARY: &str = "ocrelay-test-boundary";

    struct MockVision {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionEngine for MockVision {
        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            "mock vision".to_string()
        }

        async fn extract_text(&self, _path: &Path) -> Result<String, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(EngineError::Failed)
        }
    }

    struct MockLocal {
        reply: Result<Vec<Detection>, String>,
        calls: AtomicUsize,
        seen_path: Mutex<Option<PathBuf>>,
    }

    impl MockLocal {
        fn with_detections(detections: Vec<Detection>) -> Self {
            Self {
                reply: Ok(detections),
                calls: AtomicUsize::new(0),
                seen_path: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LocalEngine for MockLocal {
        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            "mock local".to_string()
        }

        async fn detect(
            &self,
            path: &Path,
            _flags: OcrFlags,
        ) -> Result<Vec<Detection>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_path.lock().unwrap() = Some(path.to_path_buf());
            self.reply.clone().map_err(EngineError::Failed)
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        documents: Mutex<Vec<DocumentRecord>>,
        raw: Mutex<Vec<RawDocumentRecord>>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn insert_document(&self, record: &DocumentRecord) -> Result<(), StoreError> {
            self.documents.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn insert_raw(&self, record: &RawDocumentRecord) -> Result<(), StoreError> {
            self.raw.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn state_with(
        vision: Option<Arc<MockVision>>,
        local: Arc<MockLocal>,
        store: Option<Arc<RecordingStore>>,
    ) -> AppState {
        AppState {
            coordinator: Arc::new(ExtractionCoordinator::new(
                vision.map(|v| v as Arc<dyn VisionEngine>),
                local as Arc<dyn LocalEngine>,
            )),
            store: store.map(|s| s as Arc<dyn DocumentStore>),
            max_file_size: 1024 * 1024,
            cors_origins: "*".to_string(),
        }
    }

    fn vision_ok(text: &str) -> Arc<MockVision> {
        Arc::new(MockVision {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn vision_failing(message: &str) -> Arc<MockVision> {
        Arc::new(MockVision {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn multipart_body(files: &[(&str, &[u8])]) -> Body {
        let mut body = Vec::new();
        for (filename, content) in files {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn multipart_request(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(files))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected_before_engines() {
        let vision = vision_ok("never reached");
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let app = create_router(state_with(Some(vision.clone()), local.clone(), None));

        let response = app
            .oneshot(multipart_request("/ocr", &[("payload.exe", b"MZ")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 0);
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);

        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains(".exe"));
    }

    #[tokio::test]
    async fn test_ocr_vision_success_payload_shape() {
        let vision = vision_ok("First line\nSecond line");
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let store = Arc::new(RecordingStore::default());
        let app = create_router(state_with(Some(vision), local, Some(store.clone())));

        let response = app
            .oneshot(multipart_request("/ocr", &[("scan.png", b"\x89PNG...")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Document processed successfully");

        let data = &json["data"];
        assert_eq!(data["filename"], "scan.png");
        assert_eq!(data["extracted_text"], "First line\nSecond line");
        assert_eq!(data["extraction_method"], "vision");
        assert!(!data["document_id"].as_str().unwrap().is_empty());

        let lines = data["text_lines"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["text"], "First line");
        assert_eq!(lines[0]["line_index"], 1);
        assert_eq!(lines[0]["polygon"], Value::Null);
        assert_eq!(lines[1]["line_index"], 2);

        assert_eq!(store.documents.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ocr_fallback_payload_shape() {
        let vision = vision_failing("quota exceeded");
        let local = Arc::new(MockLocal::with_detections(vec![Detection {
            text: "fallback line".to_string(),
            confidence: Some(0.75),
            polygon: Some(serde_json::json!([[10.0, 10.0], [90.0, 30.0]])),
        }]));
        let app = create_router(state_with(Some(vision), local, None));

        let response = app
            .oneshot(multipart_request("/ocr", &[("scan.jpg", b"JFIF")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        let data = &json["data"];
        assert_eq!(data["extraction_method"], "local-ocr");
        assert_eq!(data["extracted_text"], "fallback line");

        let lines = data["text_lines"].as_array().unwrap();
        assert_eq!(lines[0]["confidence"], 0.75);
        // Integral floats from the engine arrive as plain integers
        assert_eq!(lines[0]["polygon"], serde_json::json!([[10, 10], [90, 30]]));
        assert_eq!(lines[0]["line_index"], Value::Null);
    }

    #[tokio::test]
    async fn test_both_engines_failing_is_500() {
        let vision = vision_failing("model unavailable");
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let app = create_router(state_with(Some(vision), local, None));

        let response = app
            .oneshot(multipart_request("/ocr", &[("scan.png", b"img")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("Both extraction engines failed"));
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let vision = vision_ok("batch text");
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let app = create_router(state_with(Some(vision), local, None));

        let response = app
            .oneshot(multipart_request(
                "/upload",
                &[
                    ("one.png", b"a" as &[u8]),
                    ("two.exe", b"b"),
                    ("three.pdf", b"c"),
                ],
            ))
            .await
            .unwrap();

        // Per-file failures never fail the batch request itself
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["processed"], 2);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["results"].as_array().unwrap().len(), 2);

        let errors = json["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["filename"], "two.exe");
        assert!(errors[0]["error"].as_str().unwrap().contains(".exe"));
    }

    #[tokio::test]
    async fn test_batch_oversized_file_does_not_abort_siblings() {
        let vision = vision_ok("batch text");
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let mut state = state_with(Some(vision), local, None);
        state.max_file_size = 16;
        let app = create_router(state);

        let response = app
            .oneshot(multipart_request(
                "/upload",
                &[
                    ("one.png", b"a" as &[u8]),
                    ("huge.png", &[0u8; 64]),
                    ("three.pdf", b"c"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["processed"], 2);
        assert_eq!(json["failed"], 1);

        let errors = json["errors"].as_array().unwrap();
        assert_eq!(errors[0]["filename"], "huge.png");
        assert!(errors[0]["error"].as_str().unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_raw_upload_stores_base64() {
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let store = Arc::new(RecordingStore::default());
        let app = create_router(state_with(None, local.clone(), Some(store.clone())));

        let response = app
            .oneshot(multipart_request("/upload-doc", &[("notes.txt", b"hello")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["filename"], "notes.txt");
        assert_eq!(json["data"]["file_type"], ".txt");
        assert_eq!(json["data"]["file_size"], 5);

        let raw = store.raw.lock().unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].content_base64, "aGVsbG8=");
        // No OCR engine runs for raw uploads
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_request() {
        let local = Arc::new(MockLocal::with_detections(vec![Detection {
            text: "hi".to_string(),
            confidence: Some(0.9),
            polygon: None,
        }]));
        let app = create_router(state_with(None, local.clone(), None));

        let response = app
            .oneshot(multipart_request("/ocr", &[("scan.png", b"img")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = local.seen_path.lock().unwrap().clone().unwrap();
        assert!(!seen.exists(), "temp file {seen:?} should be removed");
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_failed_extraction() {
        // Both stages come up empty, so the request itself fails
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let app = create_router(state_with(None, local.clone(), None));

        let response = app
            .oneshot(multipart_request("/ocr", &[("scan.png", b"img")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let seen = local.seen_path.lock().unwrap().clone().unwrap();
        assert!(!seen.exists(), "temp file {seen:?} should be removed");
    }

    #[tokio::test]
    async fn test_oversize_upload_rejected() {
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let mut state = state_with(None, local.clone(), None);
        state.max_file_size = 16;
        let app = create_router(state);

        let response = app
            .oneshot(multipart_request(
                "/ocr",
                &[("big.png", &[0u8; 64] as &[u8])],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_reports_availability() {
        let local = Arc::new(MockLocal::with_detections(vec![]));
        let app = create_router(state_with(
            Some(vision_ok("x")),
            local,
            Some(Arc::new(RecordingStore::default())),
        ));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["vision_configured"], true);
        assert_eq!(json["local_engine_available"], true);
        assert_eq!(json["store_configured"], true);
    }
}
