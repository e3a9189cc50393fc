//! External document store.
//!
//! Extraction results are persisted as write-once rows in a managed
//! Postgres instance behind Supabase's PostgREST API. There are no update
//! or delete paths; the only contract is "construct the row and submit
//! it", with rejection surfaced distinctly from extraction failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::models::{DocumentRecord, RawDocumentRecord};

/// Table holding OCR result rows.
const DOCUMENTS_TABLE: &str = "documents";

/// Table holding raw (no-OCR) uploads.
const RAW_DOCUMENTS_TABLE: &str = "uploaded_documents";

/// Request timeout for store writes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Store rejected write (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Write-once persistence for extraction results and raw uploads.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist one extraction result row.
    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    /// Persist one raw upload row.
    async fn insert_raw(&self, record: &RawDocumentRecord) -> Result<(), StoreError>;
}

/// Supabase PostgREST client.
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, body });
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        info!(document_id = %record.id, "saving document to store");
        self.insert(DOCUMENTS_TABLE, record).await
    }

    async fn insert_raw(&self, record: &RawDocumentRecord) -> Result<(), StoreError> {
        info!(document_id = %record.id, "saving raw upload to store");
        self.insert(RAW_DOCUMENTS_TABLE, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = SupabaseStore::new("https://x.supabase.co/", "key");
        assert_eq!(store.base_url, "https://x.supabase.co");
    }
}
