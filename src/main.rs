//! ocrelay - document upload and OCR orchestration service.
//!
//! Accepts image/PDF uploads over HTTP, extracts text through a cloud
//! vision model with a local OCR fallback, and persists normalized
//! results to an external document store.

mod cli;
mod config;
mod models;
mod ocr;
mod server;
mod store;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "ocrelay=info"
    } else {
        "ocrelay=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
