use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use super::handlers;
use super::AppState;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_file_size;
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/ocr", post(handlers::ocr_document))
        .route("/upload", post(handlers::upload_documents))
        .route("/upload-doc", post(handlers::upload_raw_document))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit + 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from a comma-separated origin list. `*` allows
/// any origin; unparseable entries are dropped with a warning.
fn cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let values: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods(Any)
        .allow_headers(Any)
}
