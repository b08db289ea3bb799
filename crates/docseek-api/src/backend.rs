//! HTTP client for the document index backend.

use std::sync::Arc;

use docseek_core::{ApiKey, ClientConfig, Error, FileKind, Result};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use tracing::{debug, info, warn};

use crate::types::{Document, ErrorBody, HealthStatus, ScopedSearchRequest, SearchHit, UploadSummary};

/// Bytes handed to the transport per progress event.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Progress callback: `(bytes_sent, bytes_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A file admitted for upload, fully read into memory (bounded by the 10 MiB cap).
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
}

/// Client for the `/api/documents` and `/api/search` endpoints.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client with the configured timeout.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, config.base_url()))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/documents/upload` as multipart (`file`, `openai_api_key`).
    ///
    /// `on_progress` fires each time the transport pulls another slice of the body.
    pub async fn upload(
        &self,
        file: UploadFile,
        api_key: &ApiKey,
        on_progress: ProgressFn,
    ) -> Result<UploadSummary> {
        const FALLBACK: &str = "Upload failed. Please try again.";

        let total = file.bytes.len() as u64;
        let slices: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(|c| c.to_vec())
            .collect();
        let mut sent = 0u64;
        let body_stream = futures::stream::iter(slices).map(move |slice| {
            sent += slice.len() as u64;
            on_progress(sent, total);
            Ok::<_, std::io::Error>(slice)
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body_stream), total)
            .file_name(file.name.clone())
            .mime_str(file.kind.mime_type())
            .map_err(|e| Error::Validation(format!("Invalid MIME type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("openai_api_key", api_key.expose().to_string());

        let url = format!("{}/api/documents/upload", self.base_url);
        info!("Uploading {} ({} bytes) to {}", file.name, total, url);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(e, FALLBACK))?;
        let response = check_status(response, FALLBACK).await?;
        decode(response).await
    }

    /// `GET /api/documents/`.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        const FALLBACK: &str = "Failed to load documents";

        let url = format!("{}/api/documents/", self.base_url);
        debug!("Fetching document list from {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, FALLBACK))?;
        let response = check_status(response, FALLBACK).await?;
        decode(response).await
    }

    /// `DELETE /api/documents/{file_id}`.
    pub async fn delete_document(&self, file_id: &str) -> Result<()> {
        const FALLBACK: &str = "Failed to delete document";

        let mut url = Url::parse(&format!("{}/api/documents", self.base_url))
            .map_err(|e| Error::Config(format!("Invalid backend URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid backend URL {}", self.base_url)))?
            .push(file_id);
        debug!("Deleting document {}", file_id);
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| transport_error(e, FALLBACK))?;
        check_status(response, FALLBACK).await?;
        Ok(())
    }

    /// `GET /api/search/` with `query, openai_api_key, limit, threshold`.
    pub async fn search(
        &self,
        query: &str,
        api_key: &ApiKey,
        limit: u32,
        threshold: f64,
    ) -> Result<Vec<SearchHit>> {
        let url = format!("{}/api/search/", self.base_url);
        debug!("Searching {:?} (limit={}, threshold={})", query, limit, threshold);
        let limit = limit.to_string();
        let threshold = threshold.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("openai_api_key", api_key.expose()),
                ("limit", limit.as_str()),
                ("threshold", threshold.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(e, SEARCH_FALLBACK))?;
        let response = check_status(response, SEARCH_FALLBACK).await?;
        decode(response).await
    }

    /// `POST /api/search/`, restricted to `file_ids`.
    pub async fn search_within(
        &self,
        query: &str,
        api_key: &ApiKey,
        limit: u32,
        threshold: f64,
        file_ids: &[String],
    ) -> Result<Vec<SearchHit>> {
        let url = format!("{}/api/search/", self.base_url);
        debug!("Scoped search {:?} over {} files", query, file_ids.len());
        let body = ScopedSearchRequest {
            query,
            openai_api_key: api_key.expose(),
            limit,
            threshold,
            file_ids: Some(file_ids),
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, SEARCH_FALLBACK))?;
        let response = check_status(response, SEARCH_FALLBACK).await?;
        decode(response).await
    }

    /// `GET /api/health`.
    pub async fn health(&self) -> Result<HealthStatus> {
        const FALLBACK: &str = "Health check failed";

        let url = format!("{}/api/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, FALLBACK))?;
        let response = check_status(response, FALLBACK).await?;
        decode(response).await
    }
}

const SEARCH_FALLBACK: &str = "Search failed. Please try again.";

fn transport_error(err: reqwest::Error, fallback: &str) -> Error {
    warn!("Request failed: {}", err);
    if err.is_timeout() {
        Error::Transport("Request timed out. Please try again.".into())
    } else {
        Error::Transport(fallback.to_string())
    }
}

/// Turn a non-2xx response into `Error::Backend`, preferring the server's `detail`.
async fn check_status(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message())
        .unwrap_or_else(|| fallback.to_string());
    warn!("Backend returned {}: {}", status, detail);
    Err(Error::Backend {
        status: status.as_u16(),
        detail,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| Error::Backend {
        status,
        detail: format!("Malformed response: {}", e),
    })
}
