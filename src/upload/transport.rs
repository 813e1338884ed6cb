use crate::error::{Error, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything the server needs to place one chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    pub endpoint: &'a Url,
    pub upload_id: &'a str,
    pub file_name: &'a str,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub data: &'a [u8],
    pub file_type: Option<&'a str>,
    pub extra_fields: &'a [(String, String)],
}

/// A 2xx response to a chunk.
#[derive(Debug, Clone)]
pub struct ChunkAck {
    pub status: u16,
    pub body: String,
}

/// Progress acknowledgment some servers return for intermediate chunks
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ServerProgress {
    received_chunks: u64,
    total_chunks: u64,
}

/// Sends a single chunk. Implementations keep no state between calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the server's acknowledgment.
    ///
    /// Must not issue a request when `cancel` is already cancelled, and should
    /// abort an in-flight request when it fires.
    ///
    /// # Errors
    ///
    /// - [`Error::ChunkTransport`] for non-2xx responses and network failures
    /// - [`Error::Cancelled`] when `cancel` fired
    async fn send_chunk(
        &self,
        request: ChunkRequest<'_>,
        auth_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ChunkAck>;
}

/// Multipart-over-HTTP transport.
#[derive(Clone)]
pub struct HttpTransport {
    http: HttpClient,
    timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_TIMEOUT)
    }
}

impl HttpTransport {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_client(http: HttpClient, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn exchange(
        &self,
        request: ChunkRequest<'_>,
        auth_token: Option<&str>,
    ) -> Result<ChunkAck> {
        let index = request.chunk_index;
        let form = build_form(&request)?;

        let mut builder = self.http.post(request.endpoint.clone()).multipart(form);
        if let Some(token) = auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| network_error(index, &e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| network_error(index, &e))?;

        if !status.is_success() {
            return Err(status_error(index, status, &body));
        }

        if let Ok(progress) = serde_json::from_str::<ServerProgress>(&body) {
            debug!(
                "Server has {}/{} chunks for upload {}",
                progress.received_chunks, progress.total_chunks, request.upload_id
            );
        }

        Ok(ChunkAck {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_chunk(
        &self,
        request: ChunkRequest<'_>,
        auth_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ChunkAck> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(
            "Sending chunk {}/{} ({} bytes) to {}",
            request.chunk_index + 1,
            request.total_chunks,
            request.data.len(),
            request.endpoint
        );

        // Dropping the exchange future closes the connection.
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(self.timeout, self.exchange(request, auth_token)) => {
                result.unwrap_or_else(|_| Err(Error::ChunkTransport {
                    chunk_index: request.chunk_index,
                    http_status: None,
                    status_text: "timed out".to_string(),
                    detail: None,
                }))
            }
        }
    }
}

/// Builds the multipart body for one chunk.
///
/// # Errors
///
/// Returns an error if the part's content type cannot be set.
pub fn build_form(request: &ChunkRequest<'_>) -> Result<Form> {
    let file_part = Part::bytes(request.data.to_vec())
        .file_name(request.file_name.to_string())
        .mime_str("application/octet-stream")?;

    let mut form = Form::new()
        .part("file", file_part)
        .text("fileName", request.file_name.to_string())
        .text("uploadId", request.upload_id.to_string())
        .text("chunkIndex", request.chunk_index.to_string())
        .text("totalChunks", request.total_chunks.to_string());

    if let Some(file_type) = request.file_type {
        form = form.text("fileType", file_type.to_string());
    }

    for (key, value) in request.extra_fields {
        form = form.text(key.clone(), value.clone());
    }

    Ok(form)
}

fn network_error(chunk_index: u64, error: &reqwest::Error) -> Error {
    Error::ChunkTransport {
        chunk_index,
        http_status: None,
        status_text: format!("network error: {error}"),
        detail: None,
    }
}

fn status_error(chunk_index: u64, status: StatusCode, body: &str) -> Error {
    Error::ChunkTransport {
        chunk_index,
        http_status: Some(status.as_u16()),
        status_text: status.canonical_reason().unwrap_or("Unknown status").to_string(),
        detail: error_detail(body),
    }
}

/// Extracts a readable message from an error body: the `error` or `detail`
/// field of a JSON object, otherwise the (shortened) text itself.
fn error_detail(body: &str) -> Option<String> {
    const MAX_DETAIL: usize = 200;

    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(body) {
        for key in ["error", "detail", "message"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                return Some(message.clone());
            }
        }
    }

    Some(body.chars().take(MAX_DETAIL).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_json_fields() {
        assert_eq!(
            error_detail(r#"{"error": "Parâmetros incompletos"}"#),
            Some("Parâmetros incompletos".to_string())
        );
        assert_eq!(
            error_detail(r#"{"detail": "Token inválido"}"#),
            Some("Token inválido".to_string())
        );
    }

    #[test]
    fn test_error_detail_falls_back_to_text() {
        assert_eq!(error_detail("  "), None);
        assert_eq!(error_detail("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_detail(&"x".repeat(500)).map(|d| d.len()), Some(200));
    }

    #[test]
    fn test_status_error_keeps_index_and_status() {
        let err = status_error(4, StatusCode::INTERNAL_SERVER_ERROR, "");

        assert!(matches!(
            err,
            Error::ChunkTransport {
                chunk_index: 4,
                http_status: Some(500),
                ref status_text,
                detail: None,
            } if status_text == "Internal Server Error"
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_request() {
        // Nothing listens on this port; a dispatched request would fail with a
        // network error instead of `Cancelled`.
        let endpoint = Url::parse("http://127.0.0.1:9/upload").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = ChunkRequest {
            endpoint: &endpoint,
            upload_id: "upload_test",
            file_name: "book.pdf",
            chunk_index: 0,
            total_chunks: 1,
            data: b"abc",
            file_type: None,
            extra_fields: &[],
        };

        let result = HttpTransport::default()
            .send_chunk(request, None, &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
